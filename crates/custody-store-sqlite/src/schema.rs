//! SQL schema and migrations for the custody SQLite store.
//!
//! `MIGRATIONS[n]` upgrades a database from `user_version = n` to `n + 1`.
//! Each step runs in its own transaction together with the version bump, so
//! a failed step leaves the database at the previous version. Entries are
//! append-only: never edit a migration that has shipped.

use std::time::Duration;

use rusqlite::Connection;
use tracing::info;

use crate::{Error, Result};

const V1_LEDGER: &str = "
CREATE TABLE resources (
    resource_id TEXT PRIMARY KEY,
    kind        TEXT NOT NULL CHECK (kind IN ('asset', 'vehicle')),
    code        TEXT NOT NULL UNIQUE,
    category    TEXT NOT NULL,
    state       TEXT NOT NULL
                CHECK (state IN ('free', 'claimed', 'maintenance', 'retired')),
    attributes  TEXT NOT NULL DEFAULT '{}',   -- JSON object
    created_at  TEXT NOT NULL,                -- RFC 3339 UTC, microseconds
    updated_at  TEXT NOT NULL
);

-- One validity window per (resource, document kind).
CREATE TABLE resource_documents (
    resource_id  TEXT NOT NULL REFERENCES resources(resource_id),
    kind         TEXT NOT NULL,
    valid_from   TEXT,                        -- YYYY-MM-DD
    valid_to     TEXT,                        -- YYYY-MM-DD
    evidence_ref TEXT,
    PRIMARY KEY (resource_id, kind)
);

-- Claims are never deleted.
CREATE TABLE claims (
    claim_id           TEXT PRIMARY KEY,
    resource_id        TEXT NOT NULL REFERENCES resources(resource_id),
    holder_id          TEXT NOT NULL,
    opened_at          TEXT NOT NULL,
    opened_by          TEXT NOT NULL,
    closed_at          TEXT,
    closed_by          TEXT,
    status             TEXT NOT NULL CHECK (status IN ('active', 'closed', 'retired')),
    notes              TEXT,
    condition_on_open  TEXT,
    condition_on_close TEXT,
    retire_reason      TEXT,
    retired_by         TEXT,
    updated_at         TEXT NOT NULL,
    CHECK ((status = 'active') = (closed_at IS NULL))
);

-- At most one active claim per resource.
CREATE UNIQUE INDEX claims_one_active_idx ON claims(resource_id) WHERE status = 'active';
CREATE INDEX claims_resource_idx ON claims(resource_id, opened_at);
CREATE INDEX claims_holder_idx   ON claims(holder_id);
CREATE INDEX claims_opened_idx   ON claims(opened_at);

-- Hash-chained, append-only.
CREATE TABLE audit_entries (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id    TEXT NOT NULL UNIQUE,
    actor_id    TEXT NOT NULL,
    actor_role  TEXT NOT NULL,
    action      TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    metadata    TEXT NOT NULL,                -- JSON
    recorded_at TEXT NOT NULL,
    prev_hash   TEXT NOT NULL,
    hash        TEXT NOT NULL
);

CREATE INDEX audit_entity_idx   ON audit_entries(entity_type, entity_id);
CREATE INDEX audit_recorded_idx ON audit_entries(recorded_at);

CREATE TABLE notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL,
    category        TEXT NOT NULL,
    message         TEXT NOT NULL,
    metadata        TEXT NOT NULL DEFAULT '{}',
    read            INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE INDEX notifications_inbox_idx  ON notifications(recipient_id, created_at);
CREATE INDEX notifications_dedupe_idx ON notifications(recipient_id, category, message);
";

const V2_READINGS: &str = "
-- Start/end custody readings of a vehicle claim.
CREATE TABLE custody_readings (
    claim_id          TEXT PRIMARY KEY REFERENCES claims(claim_id),
    resource_id       TEXT NOT NULL REFERENCES resources(resource_id),
    start_value       REAL NOT NULL CHECK (start_value >= 0),
    start_evidence    TEXT NOT NULL,
    start_recorded_at TEXT NOT NULL,
    start_recorded_by TEXT NOT NULL,
    end_value         REAL CHECK (end_value >= start_value),
    end_evidence      TEXT,
    end_recorded_at   TEXT,
    end_recorded_by   TEXT
);

CREATE TRIGGER audit_entries_no_update BEFORE UPDATE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are immutable');
END;

CREATE TRIGGER audit_entries_no_delete BEFORE DELETE ON audit_entries
BEGIN
    SELECT RAISE(ABORT, 'audit entries are immutable');
END;
";

const MIGRATIONS: &[&str] = &[V1_LEDGER, V2_READINGS];

/// Schema version this build creates and understands.
pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Per-connection settings. Not persisted, so applied on every open.
pub fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
  conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
  conn.pragma_update(None, "foreign_keys", true)?;
  conn.busy_timeout(busy_timeout)?;
  Ok(())
}

pub fn user_version(conn: &Connection) -> Result<u32> {
  Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Apply every pending migration. Returns the resulting version.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
  let current = user_version(conn)?;
  if current > SCHEMA_VERSION {
    return Err(Error::SchemaTooNew { found: current, supported: SCHEMA_VERSION });
  }

  for (index, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
    let version = index as u32 + 1;
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.pragma_update(None, "user_version", version)?;
    tx.commit()?;
    info!(version, "applied schema migration");
  }

  Ok(SCHEMA_VERSION)
}
