//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so lexical order matches chronological order. Calendar dates
//! are `YYYY-MM-DD`. Enumerations use their serde names. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use custody_core::{
  audit::AuditEntry,
  claim::Claim,
  notification::Notification,
  reading::{CustodyReading, ReadingCapture},
  resource::{Document, Resource},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

/// Decode a unit enum from its serde name.
pub fn decode_enum<T: DeserializeOwned>(s: &str) -> Result<T> {
  serde_json::from_value(Value::String(s.to_owned())).map_err(|_| {
    Error::Decode(format!("{s:?} is not a valid {}", std::any::type_name::<T>()))
  })
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Resources ───────────────────────────────────────────────────────────────

pub const RESOURCE_COLUMNS: &str =
  "r.resource_id, r.kind, r.code, r.category, r.state, r.attributes, r.created_at, r.updated_at";

pub struct RawResource {
  pub resource_id: String,
  pub kind:        String,
  pub code:        String,
  pub category:    String,
  pub state:       String,
  pub attributes:  String,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawResource {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      resource_id: row.get(0)?,
      kind:        row.get(1)?,
      code:        row.get(2)?,
      category:    row.get(3)?,
      state:       row.get(4)?,
      attributes:  row.get(5)?,
      created_at:  row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_resource(self, documents: Vec<Document>) -> Result<Resource> {
    let attributes: Map<String, Value> = serde_json::from_str(&self.attributes)?;
    Ok(Resource {
      resource_id: decode_uuid(&self.resource_id)?,
      kind: decode_enum(&self.kind)?,
      code: self.code,
      category: self.category,
      state: decode_enum(&self.state)?,
      attributes,
      documents,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub struct RawDocument {
  pub kind:         String,
  pub valid_from:   Option<String>,
  pub valid_to:     Option<String>,
  pub evidence_ref: Option<String>,
}

impl RawDocument {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      kind:         row.get(0)?,
      valid_from:   row.get(1)?,
      valid_to:     row.get(2)?,
      evidence_ref: row.get(3)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      kind:         self.kind,
      valid_from:   self.valid_from.as_deref().map(decode_date).transpose()?,
      valid_to:     self.valid_to.as_deref().map(decode_date).transpose()?,
      evidence_ref: self.evidence_ref,
    })
  }
}

// ─── Claims ──────────────────────────────────────────────────────────────────

pub const CLAIM_COLUMNS: &str = "c.claim_id, c.resource_id, c.holder_id, c.opened_at, c.opened_by,
   c.closed_at, c.closed_by, c.status, c.notes, c.condition_on_open,
   c.condition_on_close, c.retire_reason, c.retired_by, c.updated_at";

pub struct RawClaim {
  pub claim_id:           String,
  pub resource_id:        String,
  pub holder_id:          String,
  pub opened_at:          String,
  pub opened_by:          String,
  pub closed_at:          Option<String>,
  pub closed_by:          Option<String>,
  pub status:             String,
  pub notes:              Option<String>,
  pub condition_on_open:  Option<String>,
  pub condition_on_close: Option<String>,
  pub retire_reason:      Option<String>,
  pub retired_by:         Option<String>,
  pub updated_at:         String,
}

impl RawClaim {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      claim_id:           row.get(0)?,
      resource_id:        row.get(1)?,
      holder_id:          row.get(2)?,
      opened_at:          row.get(3)?,
      opened_by:          row.get(4)?,
      closed_at:          row.get(5)?,
      closed_by:          row.get(6)?,
      status:             row.get(7)?,
      notes:              row.get(8)?,
      condition_on_open:  row.get(9)?,
      condition_on_close: row.get(10)?,
      retire_reason:      row.get(11)?,
      retired_by:         row.get(12)?,
      updated_at:         row.get(13)?,
    })
  }

  pub fn into_claim(self) -> Result<Claim> {
    Ok(Claim {
      claim_id:           decode_uuid(&self.claim_id)?,
      resource_id:        decode_uuid(&self.resource_id)?,
      holder_id:          self.holder_id,
      opened_at:          decode_dt(&self.opened_at)?,
      opened_by:          self.opened_by,
      closed_at:          decode_opt_dt(self.closed_at)?,
      closed_by:          self.closed_by,
      status:             decode_enum(&self.status)?,
      notes:              self.notes,
      condition_on_open:  self.condition_on_open,
      condition_on_close: self.condition_on_close,
      retire_reason:      self.retire_reason,
      retired_by:         self.retired_by,
      updated_at:         decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Custody readings ────────────────────────────────────────────────────────

pub const READING_COLUMNS: &str = "claim_id, resource_id,
   start_value, start_evidence, start_recorded_at, start_recorded_by,
   end_value, end_evidence, end_recorded_at, end_recorded_by";

pub struct RawReading {
  pub claim_id:          String,
  pub resource_id:       String,
  pub start_value:       f64,
  pub start_evidence:    String,
  pub start_recorded_at: String,
  pub start_recorded_by: String,
  pub end_value:         Option<f64>,
  pub end_evidence:      Option<String>,
  pub end_recorded_at:   Option<String>,
  pub end_recorded_by:   Option<String>,
}

impl RawReading {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      claim_id:          row.get(0)?,
      resource_id:       row.get(1)?,
      start_value:       row.get(2)?,
      start_evidence:    row.get(3)?,
      start_recorded_at: row.get(4)?,
      start_recorded_by: row.get(5)?,
      end_value:         row.get(6)?,
      end_evidence:      row.get(7)?,
      end_recorded_at:   row.get(8)?,
      end_recorded_by:   row.get(9)?,
    })
  }

  pub fn into_reading(self) -> Result<CustodyReading> {
    let end = match (self.end_value, self.end_evidence, self.end_recorded_at, self.end_recorded_by) {
      (Some(value), Some(evidence_ref), Some(at), Some(by)) => Some(ReadingCapture {
        value,
        evidence_ref,
        recorded_at: decode_dt(&at)?,
        recorded_by: by,
      }),
      (None, None, None, None) => None,
      _ => return Err(Error::Decode(format!("partial end reading on claim {}", self.claim_id))),
    };

    Ok(CustodyReading {
      claim_id: decode_uuid(&self.claim_id)?,
      resource_id: decode_uuid(&self.resource_id)?,
      start: ReadingCapture {
        value:        self.start_value,
        evidence_ref: self.start_evidence,
        recorded_at:  decode_dt(&self.start_recorded_at)?,
        recorded_by:  self.start_recorded_by,
      },
      end,
    })
  }
}

// ─── Audit entries ───────────────────────────────────────────────────────────

pub const AUDIT_COLUMNS: &str = "seq, entry_id, actor_id, actor_role, action, entity_type,
   entity_id, metadata, recorded_at, prev_hash, hash";

pub struct RawAuditEntry {
  pub seq:         i64,
  pub entry_id:    String,
  pub actor_id:    String,
  pub actor_role:  String,
  pub action:      String,
  pub entity_type: String,
  pub entity_id:   String,
  pub metadata:    String,
  pub recorded_at: String,
  pub prev_hash:   String,
  pub hash:        String,
}

impl RawAuditEntry {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:         row.get(0)?,
      entry_id:    row.get(1)?,
      actor_id:    row.get(2)?,
      actor_role:  row.get(3)?,
      action:      row.get(4)?,
      entity_type: row.get(5)?,
      entity_id:   row.get(6)?,
      metadata:    row.get(7)?,
      recorded_at: row.get(8)?,
      prev_hash:   row.get(9)?,
      hash:        row.get(10)?,
    })
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      seq:         self.seq,
      entry_id:    decode_uuid(&self.entry_id)?,
      actor_id:    self.actor_id,
      actor_role:  decode_enum(&self.actor_role)?,
      action:      decode_enum(&self.action)?,
      entity_type: decode_enum(&self.entity_type)?,
      entity_id:   decode_uuid(&self.entity_id)?,
      metadata:    serde_json::from_str(&self.metadata)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      prev_hash:   self.prev_hash,
      hash:        self.hash,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, recipient_id, category, message, metadata, read, created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub category:        String,
  pub message:         String,
  pub metadata:        String,
  pub read:            bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      recipient_id:    row.get(1)?,
      category:        row.get(2)?,
      message:         row.get(3)?,
      metadata:        row.get(4)?,
      read:            row.get(5)?,
      created_at:      row.get(6)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id:    self.recipient_id,
      category:        self.category,
      message:         self.message,
      metadata:        serde_json::from_str(&self.metadata)?,
      read:            self.read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use custody_core::{audit::AuditAction, resource::ResourceState};

  use super::*;

  #[test]
  fn timestamps_are_fixed_width() {
    let a = DateTime::parse_from_rfc3339("2025-03-10T08:00:00Z").unwrap().with_timezone(&Utc);
    assert_eq!(encode_dt(a), "2025-03-10T08:00:00.000000Z");
    assert_eq!(decode_dt(&encode_dt(a)).unwrap(), a);
  }

  #[test]
  fn enums_decode_from_serde_names() {
    assert_eq!(decode_enum::<ResourceState>("maintenance").unwrap(), ResourceState::Maintenance);
    assert_eq!(decode_enum::<AuditAction>("OPEN_CLAIM").unwrap(), AuditAction::OpenClaim);
    assert!(matches!(decode_enum::<ResourceState>("lost"), Err(Error::Decode(_))));
  }
}
