//! Claim ledger rows: `claims` and `custody_readings`.

use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};
use uuid::Uuid;

use custody_core::{
  Error as CoreError,
  claim::{Claim, ClaimFilter, ClaimStatus},
  reading::CustodyReading,
  store::Page,
};

use crate::{
  Result,
  encode::{
    CLAIM_COLUMNS, READING_COLUMNS, RawClaim, RawReading, encode_date, encode_dt, encode_uuid,
  },
  error::is_unique_violation,
  filter::{Conditions, page_of, text},
};

// ─── Claims ──────────────────────────────────────────────────────────────────

/// Insert a new claim. The partial unique index turns a second active claim
/// for the same resource into [`CoreError::AlreadyClaimed`].
pub fn insert(conn: &Connection, claim: &Claim) -> Result<()> {
  conn
    .execute(
      "INSERT INTO claims (
         claim_id, resource_id, holder_id, opened_at, opened_by, closed_at, closed_by,
         status, notes, condition_on_open, condition_on_close, retire_reason, retired_by,
         updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
      params![
        encode_uuid(claim.claim_id),
        encode_uuid(claim.resource_id),
        claim.holder_id,
        encode_dt(claim.opened_at),
        claim.opened_by,
        claim.closed_at.map(encode_dt),
        claim.closed_by,
        claim.status.as_str(),
        claim.notes,
        claim.condition_on_open,
        claim.condition_on_close,
        claim.retire_reason,
        claim.retired_by,
        encode_dt(claim.updated_at),
      ],
    )
    .map_err(|err| {
      if is_unique_violation(&err) {
        CoreError::AlreadyClaimed(claim.resource_id).into()
      } else {
        crate::Error::from(err)
      }
    })?;
  Ok(())
}

/// Write back every mutable column of an existing claim.
pub fn save(conn: &Connection, claim: &Claim) -> Result<()> {
  conn.execute(
    "UPDATE claims
        SET closed_at = ?2, closed_by = ?3, status = ?4, notes = ?5,
            condition_on_close = ?6, retire_reason = ?7, retired_by = ?8, updated_at = ?9
      WHERE claim_id = ?1",
    params![
      encode_uuid(claim.claim_id),
      claim.closed_at.map(encode_dt),
      claim.closed_by,
      claim.status.as_str(),
      claim.notes,
      claim.condition_on_close,
      claim.retire_reason,
      claim.retired_by,
      encode_dt(claim.updated_at),
    ],
  )?;
  Ok(())
}

pub fn load(conn: &Connection, claim_id: Uuid) -> Result<Option<Claim>> {
  conn
    .query_row(
      &format!("SELECT {CLAIM_COLUMNS} FROM claims c WHERE c.claim_id = ?1"),
      params![encode_uuid(claim_id)],
      RawClaim::from_row,
    )
    .optional()?
    .map(RawClaim::into_claim)
    .transpose()
}

pub fn require(conn: &Connection, claim_id: Uuid) -> Result<Claim> {
  load(conn, claim_id)?.ok_or_else(|| CoreError::ClaimNotFound(claim_id).into())
}

pub fn find_active(conn: &Connection, resource_id: Uuid) -> Result<Option<Claim>> {
  conn
    .query_row(
      &format!(
        "SELECT {CLAIM_COLUMNS} FROM claims c
          WHERE c.resource_id = ?1 AND c.status = 'active'"
      ),
      params![encode_uuid(resource_id)],
      RawClaim::from_row,
    )
    .optional()?
    .map(RawClaim::into_claim)
    .transpose()
}

pub fn list(conn: &Connection, filter: &ClaimFilter) -> Result<Page<Claim>> {
  let mut conds = Conditions::new();
  if let Some(id) = filter.claim_id {
    conds.push("c.claim_id = ?", [text(&encode_uuid(id))]);
  }
  if let Some(id) = filter.resource_id {
    conds.push("c.resource_id = ?", [text(&encode_uuid(id))]);
  }
  if let Some(holder) = filter.holder_id.as_deref() {
    conds.push("c.holder_id = ?", [text(holder)]);
  }
  if let Some(kind) = filter.resource_kind {
    conds.push("r.kind = ?", [text(kind.as_str())]);
  }
  conds.push_in("c.status", filter.statuses.iter().map(|s| text(s.as_str())));
  match filter.retired {
    Some(true) => conds.push("c.status = ?", [text(ClaimStatus::Retired.as_str())]),
    Some(false) => conds.push("c.status <> ?", [text(ClaimStatus::Retired.as_str())]),
    None => {}
  }
  if let Some(from) = filter.opened_from {
    conds.push("c.opened_at >= ?", [text(&encode_dt(from))]);
  }
  if let Some(to) = filter.opened_to {
    conds.push("c.opened_at <= ?", [text(&encode_dt(to))]);
  }
  if let Some(day) = filter.opened_on {
    conds.push("substr(c.opened_at, 1, 10) = ?", [text(&encode_date(day))]);
  }
  if let Some(day) = filter.closed_on {
    conds.push("substr(c.closed_at, 1, 10) = ?", [text(&encode_date(day))]);
  }
  let where_clause = conds.where_clause();

  let total: i64 = conn.query_row(
    &format!(
      "SELECT COUNT(*) FROM claims c
         JOIN resources r ON r.resource_id = c.resource_id
       {where_clause}"
    ),
    params_from_iter(conds.args()),
    |row| row.get(0),
  )?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {CLAIM_COLUMNS} FROM claims c
       JOIN resources r ON r.resource_id = c.resource_id
     {where_clause}
     ORDER BY c.opened_at DESC, c.claim_id
     LIMIT ? OFFSET ?"
  ))?;
  let data = stmt
    .query_map(params_from_iter(conds.paged_args(&filter.page)), RawClaim::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawClaim::into_claim)
    .collect::<Result<_>>()?;

  Ok(page_of(data, &filter.page, total))
}

// ─── Custody readings ────────────────────────────────────────────────────────

pub fn load_reading(conn: &Connection, claim_id: Uuid) -> Result<Option<CustodyReading>> {
  conn
    .query_row(
      &format!("SELECT {READING_COLUMNS} FROM custody_readings WHERE claim_id = ?1"),
      params![encode_uuid(claim_id)],
      RawReading::from_row,
    )
    .optional()?
    .map(RawReading::into_reading)
    .transpose()
}

/// Insert or overwrite the reading pair of a claim. The start reading is
/// never rewritten once stored.
pub fn save_reading(conn: &Connection, reading: &CustodyReading) -> Result<()> {
  let end = reading.end.as_ref();
  conn.execute(
    "INSERT INTO custody_readings (
       claim_id, resource_id,
       start_value, start_evidence, start_recorded_at, start_recorded_by,
       end_value, end_evidence, end_recorded_at, end_recorded_by
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
     ON CONFLICT (claim_id) DO UPDATE SET
       end_value       = excluded.end_value,
       end_evidence    = excluded.end_evidence,
       end_recorded_at = excluded.end_recorded_at,
       end_recorded_by = excluded.end_recorded_by",
    params![
      encode_uuid(reading.claim_id),
      encode_uuid(reading.resource_id),
      reading.start.value,
      reading.start.evidence_ref,
      encode_dt(reading.start.recorded_at),
      reading.start.recorded_by,
      end.map(|e| e.value),
      end.map(|e| e.evidence_ref.as_str()),
      end.map(|e| encode_dt(e.recorded_at)),
      end.map(|e| e.recorded_by.as_str()),
    ],
  )?;
  Ok(())
}
