//! Audit sink: hash-chained rows in `audit_entries`.
//!
//! Entries are appended only from inside the transaction of the mutation they
//! describe. The write lock held by that transaction also serialises access
//! to the chain head, so `prev_hash` is always the latest committed hash.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};
use uuid::Uuid;

use custody_core::{
  audit::{AuditEntry, AuditQuery, ChainReport, GENESIS_HASH, NewAuditEntry, verify_chain},
  store::Page,
};

use crate::{
  Result,
  encode::{AUDIT_COLUMNS, RawAuditEntry, encode_dt, encode_uuid},
  filter::{Conditions, page_of, text},
};

fn chain_head(conn: &Connection) -> Result<String> {
  Ok(
    conn
      .query_row("SELECT hash FROM audit_entries ORDER BY seq DESC LIMIT 1", [], |row| {
        row.get(0)
      })
      .optional()?
      .unwrap_or_else(|| GENESIS_HASH.to_owned()),
  )
}

/// Append `entry` to the chain. Must run inside the caller's transaction.
pub fn record(conn: &Connection, entry: NewAuditEntry, now: DateTime<Utc>) -> Result<AuditEntry> {
  let prev = chain_head(conn)?;
  let mut sealed = entry.seal(&prev, now);

  conn.execute(
    "INSERT INTO audit_entries (
       entry_id, actor_id, actor_role, action, entity_type, entity_id,
       metadata, recorded_at, prev_hash, hash
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    params![
      encode_uuid(sealed.entry_id),
      sealed.actor_id,
      sealed.actor_role.as_str(),
      sealed.action.as_str(),
      sealed.entity_type.as_str(),
      encode_uuid(sealed.entity_id),
      sealed.metadata.to_string(),
      encode_dt(sealed.recorded_at),
      sealed.prev_hash,
      sealed.hash,
    ],
  )?;
  sealed.seq = conn.last_insert_rowid();
  Ok(sealed)
}

pub fn list(conn: &Connection, query: &AuditQuery) -> Result<Page<AuditEntry>> {
  let mut conds = Conditions::new();
  if let Some(action) = query.action {
    conds.push("action = ?", [text(action.as_str())]);
  }
  if let Some(actor) = query.actor_id.as_deref() {
    conds.push("actor_id = ?", [text(actor)]);
  }
  if let Some(entity_type) = query.entity_type {
    conds.push("entity_type = ?", [text(entity_type.as_str())]);
  }
  if let Some(id) = query.entity_id {
    conds.push("entity_id = ?", [text(&encode_uuid(id))]);
  }
  if let Some(from) = query.from {
    conds.push("recorded_at >= ?", [text(&encode_dt(from))]);
  }
  if let Some(to) = query.to {
    conds.push("recorded_at <= ?", [text(&encode_dt(to))]);
  }
  if let Some(needle) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
    conds.push_text(&["action", "entity_id", "metadata"], needle);
  }
  let where_clause = conds.where_clause();

  let total: i64 = conn.query_row(
    &format!("SELECT COUNT(*) FROM audit_entries {where_clause}"),
    params_from_iter(conds.args()),
    |row| row.get(0),
  )?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {AUDIT_COLUMNS} FROM audit_entries {where_clause}
      ORDER BY seq DESC
      LIMIT ? OFFSET ?"
  ))?;
  let data = stmt
    .query_map(params_from_iter(conds.paged_args(&query.page)), RawAuditEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawAuditEntry::into_entry)
    .collect::<Result<_>>()?;

  Ok(page_of(data, &query.page, total))
}

/// Re-walk the whole chain from the genesis entry.
pub fn verify(conn: &Connection) -> Result<ChainReport> {
  let mut stmt = conn.prepare(&format!("SELECT {AUDIT_COLUMNS} FROM audit_entries ORDER BY seq"))?;
  let entries = stmt
    .query_map([], RawAuditEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawAuditEntry::into_entry)
    .collect::<Result<Vec<_>>>()?;
  Ok(verify_chain(&entries))
}

/// Whether the retirement of `resource_id` is held by something other than
/// `claim_id`: another retired claim, or an administrative retirement
/// recorded after this claim was retired.
pub fn retirement_held_elsewhere(conn: &Connection, resource_id: Uuid, claim_id: Uuid) -> Result<bool> {
  Ok(conn.query_row(
    "SELECT EXISTS(
         SELECT 1 FROM claims
          WHERE resource_id = ?1 AND claim_id <> ?2 AND status = 'retired'
       )
       OR EXISTS(
         SELECT 1 FROM audit_entries
          WHERE action = 'UPDATE_RESOURCE_STATE'
            AND entity_id = ?1
            AND json_extract(metadata, '$.to') = 'retired'
            AND seq > COALESCE((
              SELECT MAX(seq) FROM audit_entries
               WHERE entity_id = ?2
                 AND ((action = 'CLOSE_CLAIM'
                       AND json_extract(metadata, '$.status') = 'retired')
                   OR (action = 'AMEND_CLOSED_CLAIM'
                       AND json_extract(metadata, '$.changes.status.to') = 'retired'))
            ), 0)
       )",
    params![encode_uuid(resource_id), encode_uuid(claim_id)],
    |row| row.get(0),
  )?)
}
