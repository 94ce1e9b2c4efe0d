//! SQL schema for the parked-extension ledger.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Records are appended once per resolved conflict and never removed.
-- Releasing an extension only flips `deleted`.
CREATE TABLE IF NOT EXISTS parked_extensions (
    entry_id    TEXT PRIMARY KEY,
    object_id   TEXT NOT NULL,   -- claimant voicemail object id
    alias       TEXT NOT NULL,   -- claimant voicemail alias
    extension   TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- ISO 8601 UTC
    deleted     INTEGER NOT NULL DEFAULT 0 CHECK (deleted IN (0, 1)),
    released_at TEXT
);

-- At most one active record per extension.
CREATE UNIQUE INDEX IF NOT EXISTS parked_active_extension_idx
    ON parked_extensions(extension) WHERE deleted = 0;

CREATE INDEX IF NOT EXISTS parked_object_idx ON parked_extensions(object_id);

PRAGMA user_version = 1;
";
