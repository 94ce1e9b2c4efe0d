//! Error type for `handover-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] handover_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Another active record already holds the extension.
  #[error("extension {0} is already parked")]
  AlreadyParked(String),

  #[error("no active parked record for extension {0}")]
  NotParked(String),

  #[error("the parked-extension ledger has no query {0}")]
  UnsupportedQuery(String),

  #[error("the parked-extension ledger has no action {0}")]
  UnsupportedAction(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
