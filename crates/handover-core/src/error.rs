//! Error types for `handover-core`.

use serde::Serialize;
use thiserror::Error;

/// A collaborator failure, type-erased so the workflow stays generic over
/// backend adapters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// A required lookup returned zero rows.
  #[error("{entity} not found for [{key}]")]
  NotFound { entity: &'static str, key: String },

  /// A lookup expected to be unique returned several rows.
  #[error("found {count} {entity} records for [{key}], expected one")]
  Ambiguous {
    entity: &'static str,
    key:    String,
    count:  usize,
  },

  /// A backend refused a mutation.
  #[error("{system} rejected {action}: {source}")]
  RemoteRejection {
    system: String,
    action: &'static str,
    #[source]
    source: BoxError,
  },

  #[error("unable to find a free parked extension after {attempts} attempts")]
  ExhaustedRetry {
    attempts: u32,
    /// Message of the last rejected attempt, if any attempt reached the
    /// backend.
    last:     Option<String>,
  },

  #[error("lookup {query} failed: {source}")]
  Lookup {
    query:  &'static str,
    #[source]
    source: BoxError,
  },

  #[error("could not decode {what}: {source}")]
  Decode {
    what:   &'static str,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid configuration: {0}")]
  Config(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::NotFound { .. } => ErrorKind::NotFound,
      Self::Ambiguous { .. } => ErrorKind::Ambiguous,
      Self::RemoteRejection { .. } => ErrorKind::RemoteRejection,
      Self::ExhaustedRetry { .. } => ErrorKind::ExhaustedRetry,
      Self::Lookup { .. } => ErrorKind::Lookup,
      Self::Decode { .. } => ErrorKind::Decode,
      Self::Config(_) => ErrorKind::Config,
    }
  }
}

/// Coarse classification of [`Error`], stable enough to put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  NotFound,
  Ambiguous,
  RemoteRejection,
  ExhaustedRetry,
  Lookup,
  Decode,
  Config,
}

impl ErrorKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NotFound => "not_found",
      Self::Ambiguous => "ambiguous",
      Self::RemoteRejection => "remote_rejection",
      Self::ExhaustedRetry => "exhausted_retry",
      Self::Lookup => "lookup",
      Self::Decode => "decode",
      Self::Config => "config",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
