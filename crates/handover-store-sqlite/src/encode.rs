//! Conversions between ledger rows and domain types.
//!
//! Timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings.

use chrono::{DateTime, Utc};
use handover_core::model::ParkedExtensionRecord;
use uuid::Uuid;

use crate::{Error, LedgerEntry, Result};

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Columns of one `parked_extensions` row, as read.
pub struct RawEntry {
  pub entry_id:    String,
  pub object_id:   String,
  pub alias:       String,
  pub extension:   String,
  pub created_at:  String,
  pub deleted:     bool,
  pub released_at: Option<String>,
}

impl RawEntry {
  pub const COLUMNS: &'static str =
    "entry_id, object_id, alias, extension, created_at, deleted, released_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:    row.get(0)?,
      object_id:   row.get(1)?,
      alias:       row.get(2)?,
      extension:   row.get(3)?,
      created_at:  row.get(4)?,
      deleted:     row.get(5)?,
      released_at: row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
      entry_id:    decode_uuid(&self.entry_id)?,
      record:      ParkedExtensionRecord {
        object_id:  self.object_id,
        alias:      self.alias,
        extension:  self.extension,
        created_at: decode_dt(&self.created_at)?,
        deleted:    self.deleted,
      },
      released_at: self.released_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
