//! The `Lookup` and `Action` collaborator traits.
//!
//! Both are implemented by backend adapters (an HTTP gateway, the SQLite
//! parked-extension ledger, the in-memory fake used in tests). The workflow
//! depends on these abstractions only, never on a concrete backend.
//!
//! The traits speak the backends' untyped dialect: a name, a map of named
//! parameters, and JSON rows. [`Query`](crate::query::Query) and
//! [`ActionRequest`](crate::request::ActionRequest) give each call site a
//! typed view of that dialect; [`to_params`] and [`decode`] convert at the
//! boundary.

use std::future::Future;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Error, Result};

/// Named parameters of a lookup or action.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// One result row (lookups) or one result object (actions).
pub type Row = serde_json::Value;

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Read access to the backend systems through named queries.
///
/// Rows are order-insensitive. Zero, one and many rows are all valid
/// answers; deciding which of them the caller can accept is the caller's job.
pub trait Lookup: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Run the query called `query` with `params`.
  fn lookup<'a>(
    &'a self,
    query: &'a str,
    params: Params,
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + 'a;
}

/// The only way remote state changes.
///
/// An `Err` is a remote rejection (validation failure, duplicate, naming
/// collision); whether it is fatal is decided by the caller.
pub trait Action: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Run `action` on the system known as `system`.
  fn run<'a>(
    &'a self,
    system: &'a str,
    action: &'a str,
    params: Params,
  ) -> impl Future<Output = Result<Row, Self::Error>> + Send + 'a;
}

// ─── Conversions ─────────────────────────────────────────────────────────────

/// Serialise a typed query or payload into named parameters.
///
/// Unit structs (queries without parameters) become an empty map.
pub fn to_params<T: Serialize>(value: &T, what: &'static str) -> Result<Params> {
  match serde_json::to_value(value).map_err(|source| Error::Decode { what, source })? {
    serde_json::Value::Object(map) => Ok(map),
    serde_json::Value::Null => Ok(Params::new()),
    other => Err(Error::Decode {
      what,
      source: serde::de::Error::custom(format!("expected an object, got {other}")),
    }),
  }
}

/// Deserialise a row into its typed form.
pub fn decode<T: DeserializeOwned>(row: Row, what: &'static str) -> Result<T> {
  serde_json::from_value(row).map_err(|source| Error::Decode { what, source })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{
    model::Line,
    query::{LineById, ParkedMailboxes, Query},
  };

  #[test]
  fn params_from_struct_and_unit() {
    let params = to_params(&LineById::new("line-1"), LineById::ENTITY).unwrap();
    assert_eq!(params.get("UUID"), Some(&json!("line-1")));
    assert!(to_params(&ParkedMailboxes, ParkedMailboxes::ENTITY).unwrap().is_empty());
  }

  #[test]
  fn decode_reports_what_failed() {
    let err = decode::<Line>(json!({ "uuid": 1 }), "call-manager line").unwrap_err();
    assert!(matches!(err, Error::Decode { what: "call-manager line", .. }));
  }
}
