//! [`SqliteLedger`], the SQLite-backed internal audit system.

use std::path::Path;

use chrono::{DateTime, Utc};
use handover_core::{
  collab::{Action, Lookup, Params, Row, decode},
  model::ParkedExtensionRecord,
  query::{ParkedMailboxes, Query as _},
  request::{ActionRequest as _, RecordParkedMailbox, ReleaseParkedMailbox},
};
use rusqlite::{ErrorCode, OptionalExtension as _};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawEntry, encode_dt, encode_uuid},
  schema::SCHEMA,
};

/// One stored parked-extension record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
  pub entry_id:    Uuid,
  #[serde(flatten)]
  pub record:      ParkedExtensionRecord,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub released_at: Option<DateTime<Utc>>,
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// Parked-extension ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteLedger {
  conn: tokio_rusqlite::Connection,
}

impl SqliteLedger {
  /// Open (or create) a ledger at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let ledger = Self { conn };
    ledger.init_schema().await?;
    Ok(ledger)
  }

  /// Open an in-memory ledger, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let ledger = Self { conn };
    ledger.init_schema().await?;
    Ok(ledger)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append `record`.
  ///
  /// Fails with [`Error::AlreadyParked`] when an active record already holds
  /// the same extension.
  pub async fn record(&self, record: &ParkedExtensionRecord) -> Result<LedgerEntry> {
    let entry = LedgerEntry {
      entry_id:    Uuid::new_v4(),
      record:      record.clone(),
      released_at: None,
    };

    let id_str    = encode_uuid(entry.entry_id);
    let object_id = record.object_id.clone();
    let alias     = record.alias.clone();
    let extension = record.extension.clone();
    let at_str    = encode_dt(record.created_at);
    let deleted   = record.deleted;

    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO parked_extensions
             (entry_id, object_id, alias, extension, created_at, deleted)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, object_id, alias, extension, at_str, deleted],
        );
        match result {
          Ok(_) => Ok(true),
          Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::AlreadyParked(record.extension.clone()));
    }

    info!(
      extension = %record.extension,
      alias = %record.alias,
      entry_id = %entry.entry_id,
      "parked extension recorded"
    );
    Ok(entry)
  }

  /// Records that still hold their extension, oldest first.
  pub async fn active(&self) -> Result<Vec<LedgerEntry>> { self.list(false).await }

  /// Every record, released ones included, oldest first.
  pub async fn history(&self) -> Result<Vec<LedgerEntry>> { self.list(true).await }

  async fn list(&self, include_released: bool) -> Result<Vec<LedgerEntry>> {
    let sql = if include_released {
      format!("SELECT {} FROM parked_extensions ORDER BY created_at, rowid", RawEntry::COLUMNS)
    } else {
      format!(
        "SELECT {} FROM parked_extensions WHERE deleted = 0 ORDER BY created_at, rowid",
        RawEntry::COLUMNS
      )
    };

    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }

  /// Mark the active record holding `extension` as deleted, making the
  /// extension available to future runs.
  pub async fn release(&self, extension: &str) -> Result<LedgerEntry> {
    let ext = extension.to_owned();
    let at_str = encode_dt(Utc::now());

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let entry_id: Option<String> = tx
          .query_row(
            "SELECT entry_id FROM parked_extensions WHERE extension = ?1 AND deleted = 0",
            rusqlite::params![ext],
            |r| r.get(0),
          )
          .optional()?;

        let Some(entry_id) = entry_id else {
          return Ok(None);
        };

        tx.execute(
          "UPDATE parked_extensions SET deleted = 1, released_at = ?2 WHERE entry_id = ?1",
          rusqlite::params![entry_id, at_str],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {} FROM parked_extensions WHERE entry_id = ?1", RawEntry::COLUMNS),
          rusqlite::params![entry_id],
          RawEntry::from_row,
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    let entry = raw
      .ok_or_else(|| Error::NotParked(extension.to_owned()))?
      .into_entry()?;
    info!(extension, entry_id = %entry.entry_id, "parked extension released");
    Ok(entry)
  }
}

// ─── Collaborator impls ──────────────────────────────────────────────────────

impl Lookup for SqliteLedger {
  type Error = Error;

  async fn lookup<'a>(&'a self, query: &'a str, _params: Params) -> Result<Vec<Row>> {
    if query != ParkedMailboxes::NAME {
      return Err(Error::UnsupportedQuery(query.to_owned()));
    }

    let entries = self.active().await?;
    debug!(count = entries.len(), "serving parked roster");
    entries
      .iter()
      .map(|entry| serde_json::to_value(&entry.record).map_err(Error::from))
      .collect()
  }
}

impl Action for SqliteLedger {
  type Error = Error;

  async fn run<'a>(&'a self, _system: &'a str, action: &'a str, params: Params) -> Result<Row> {
    let entry = if action == RecordParkedMailbox::NAME {
      let record: ParkedExtensionRecord = decode(Row::Object(params), ParkedMailboxes::ENTITY)?;
      self.record(&record).await?
    } else if action == ReleaseParkedMailbox::NAME {
      let request: ReleaseParkedMailbox = decode(Row::Object(params), ReleaseParkedMailbox::NAME)?;
      self.release(&request.extension).await?
    } else {
      return Err(Error::UnsupportedAction(action.to_owned()));
    };

    Ok(serde_json::json!({ "entry_id": entry.entry_id }))
  }
}
