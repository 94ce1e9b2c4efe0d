//! SQLite ledger of parked extensions.
//!
//! Serves the internal audit system: the `GetParkedMailboxes` lookup that
//! seeds a run's exclusion pool and the `MailboxParkingCreate` action that
//! appends to it. Wraps [`tokio_rusqlite`] so all database access runs on a
//! dedicated thread without blocking the async runtime.

mod encode;
mod ledger;
mod schema;

pub mod error;

pub use error::{Error, Result};
pub use ledger::{LedgerEntry, SqliteLedger};
