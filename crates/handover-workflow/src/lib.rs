//! The line reassignment workflow.
//!
//! [`Reassigner`] hands a line, its device, and the matching voicemail and
//! directory identity from one owner to another across three independently
//! consistent backends. There is no cross-system transaction: phases run in
//! a fixed order, each gated on the previous one, and a failure stops the
//! run where it is. The only step with retry semantics is the commit of a
//! parked extension, see [`extension`] and [`resolver`].
//!
//! Concurrent runs share no in-process state. Two runs targeting the same
//! line or extension at once are not guarded against; callers that need
//! that guarantee must serialise requests per line themselves.

pub mod dispatch;
pub mod extension;
mod fetch;
pub mod outcome;
pub mod resolver;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod workflow;

pub use outcome::{AccountStep, Outcome, VoicemailStep};
pub use resolver::Resolution;
pub use workflow::{ReassignmentRequest, Reassigner};
