//! Cardinality-checked lookups.
//!
//! The lookup collaborator returns any number of rows; each call site states
//! how many it can accept. Zero rows where one is required is `NotFound`,
//! several where at most one is expected is `Ambiguous`.

use handover_core::{
  Error, Result,
  collab::{Lookup, decode, to_params},
  query::Query,
};
use tracing::{debug, info};

async fn rows<L: Lookup, Q: Query>(lookup: &L, query: &Q) -> Result<Vec<Q::Row>> {
  let params = to_params(query, Q::ENTITY)?;
  debug!(query = Q::NAME, key = %query.key(), "lookup");

  let rows = lookup
    .lookup(Q::NAME, params)
    .await
    .map_err(|e| Error::Lookup { query: Q::NAME, source: Box::new(e) })?;

  rows.into_iter().map(|row| decode(row, Q::ENTITY)).collect()
}

/// Exactly one row, or `NotFound` / `Ambiguous`.
pub async fn exactly_one<L: Lookup, Q: Query>(lookup: &L, query: &Q) -> Result<Q::Row> {
  match at_most_one(lookup, query).await? {
    Some(row) => Ok(row),
    None => Err(Error::NotFound { entity: Q::ENTITY, key: query.key() }),
  }
}

/// Zero or one row, or `Ambiguous`.
pub async fn at_most_one<L: Lookup, Q: Query>(
  lookup: &L,
  query: &Q,
) -> Result<Option<Q::Row>> {
  let mut found = rows(lookup, query).await?;
  match found.len() {
    0 => Ok(None),
    1 => {
      info!(entity = Q::ENTITY, key = %query.key(), "found");
      Ok(found.pop())
    }
    count => Err(Error::Ambiguous { entity: Q::ENTITY, key: query.key(), count }),
  }
}

/// One or more rows, or `NotFound`.
pub async fn at_least_one<L: Lookup, Q: Query>(
  lookup: &L,
  query: &Q,
) -> Result<Vec<Q::Row>> {
  let found = rows(lookup, query).await?;
  if found.is_empty() {
    return Err(Error::NotFound { entity: Q::ENTITY, key: query.key() });
  }
  info!(entity = Q::ENTITY, key = %query.key(), count = found.len(), "found");
  Ok(found)
}

/// Any number of rows.
pub async fn all<L: Lookup, Q: Query>(lookup: &L, query: &Q) -> Result<Vec<Q::Row>> {
  rows(lookup, query).await
}
