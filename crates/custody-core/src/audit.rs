//! Audit entries, the append-only record of every administrative mutation.
//!
//! Entries are written inside the same transaction as the change they
//! describe and are chained by SHA-256: each entry's hash covers the previous
//! entry's hash plus its own canonical content, so editing or removing a row
//! breaks every later link.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  Result,
  actor::{Actor, Role},
  store::PageRequest,
};

/// Hash used as `prev_hash` by the first entry in the chain.
pub const GENESIS_HASH: &str =
  "0000000000000000000000000000000000000000000000000000000000000000";

// ─── Vocabulary ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
  CreateResource,
  UpdateResource,
  UpdateResourceState,
  OpenClaim,
  CloseClaim,
  AmendClosedClaim,
  RecordReading,
}

impl AuditAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::CreateResource => "CREATE_RESOURCE",
      Self::UpdateResource => "UPDATE_RESOURCE",
      Self::UpdateResourceState => "UPDATE_RESOURCE_STATE",
      Self::OpenClaim => "OPEN_CLAIM",
      Self::CloseClaim => "CLOSE_CLAIM",
      Self::AmendClosedClaim => "AMEND_CLOSED_CLAIM",
      Self::RecordReading => "RECORD_READING",
    }
  }
}

impl fmt::Display for AuditAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
  Resource,
  Claim,
}

impl EntityType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Resource => "resource",
      Self::Claim => "claim",
    }
  }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// An audit record before it is sequenced and hashed by the sink.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub actor:       Actor,
  pub action:      AuditAction,
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub metadata:    Value,
}

impl NewAuditEntry {
  pub fn new(
    actor: &Actor,
    action: AuditAction,
    entity_type: EntityType,
    entity_id: Uuid,
    metadata: Value,
  ) -> Self {
    Self { actor: actor.clone(), action, entity_type, entity_id, metadata }
  }

  /// Seal the entry onto the chain after `prev_hash`.
  pub fn seal(self, prev_hash: &str, recorded_at: DateTime<Utc>) -> AuditEntry {
    let mut entry = AuditEntry {
      seq:         0,
      entry_id:    Uuid::new_v4(),
      actor_id:    self.actor.id,
      actor_role:  self.actor.role,
      action:      self.action,
      entity_type: self.entity_type,
      entity_id:   self.entity_id,
      metadata:    self.metadata,
      recorded_at,
      prev_hash:   prev_hash.to_owned(),
      hash:        String::new(),
    };
    entry.hash = entry.compute_hash();
    entry
  }
}

/// An immutable, sequenced audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  /// Position in the chain, assigned by the store.
  pub seq:         i64,
  pub entry_id:    Uuid,
  pub actor_id:    String,
  pub actor_role:  Role,
  pub action:      AuditAction,
  pub entity_type: EntityType,
  pub entity_id:   Uuid,
  pub metadata:    Value,
  pub recorded_at: DateTime<Utc>,
  pub prev_hash:   String,
  pub hash:        String,
}

impl AuditEntry {
  /// Hex SHA-256 over `prev_hash` and the canonical JSON of the content
  /// fields. `serde_json` maps are key-sorted and floats are parsed with
  /// `float_roundtrip`, so the encoding is stable across a storage
  /// round-trip.
  pub fn compute_hash(&self) -> String {
    let canonical = json!([
      self.entry_id,
      self.actor_id,
      self.actor_role,
      self.action,
      self.entity_type,
      self.entity_id,
      self.metadata,
      self.recorded_at.to_rfc3339_opts(SecondsFormat::Micros, true),
    ]);
    let mut hasher = Sha256::new();
    hasher.update(self.prev_hash.as_bytes());
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Outcome of re-walking the audit hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
  pub entries_checked: u64,
  /// Sequence number of the first entry whose link or hash does not verify.
  pub first_broken:    Option<i64>,
}

impl ChainReport {
  pub fn is_intact(&self) -> bool { self.first_broken.is_none() }
}

/// Verify a run of entries ordered by `seq`, starting at the genesis.
pub fn verify_chain<'a>(entries: impl IntoIterator<Item = &'a AuditEntry>) -> ChainReport {
  let mut prev = GENESIS_HASH.to_owned();
  let mut checked = 0;
  for entry in entries {
    checked += 1;
    if entry.prev_hash != prev || entry.compute_hash() != entry.hash {
      return ChainReport { entries_checked: checked, first_broken: Some(entry.seq) };
    }
    prev.clone_from(&entry.hash);
  }
  ChainReport { entries_checked: checked, first_broken: None }
}

// ─── Field diffs ─────────────────────────────────────────────────────────────

/// Accumulates `{field: {from, to}}` pairs for fields whose serialised value
/// actually changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes(Map<String, Value>);

impl Changes {
  pub fn new() -> Self { Self::default() }

  pub fn track<T: Serialize + ?Sized>(&mut self, field: &str, from: &T, to: &T) -> Result<()> {
    let from = serde_json::to_value(from)?;
    let to = serde_json::to_value(to)?;
    if from != to {
      self.0.insert(field.to_owned(), json!({ "from": from, "to": to }));
    }
    Ok(())
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn contains(&self, field: &str) -> bool { self.0.contains_key(field) }

  pub fn into_value(self) -> Value { Value::Object(self.0) }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for listing audit entries, newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
  pub action:      Option<AuditAction>,
  pub actor_id:    Option<String>,
  pub entity_type: Option<EntityType>,
  pub entity_id:   Option<Uuid>,
  pub from:        Option<DateTime<Utc>>,
  pub to:          Option<DateTime<Utc>>,
  /// Substring match over the action, entity id and metadata.
  pub text:        Option<String>,
  pub page:        PageRequest,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chain(n: usize) -> Vec<AuditEntry> {
    let actor = Actor::new("it-1", Role::ItAdmin);
    let mut prev = GENESIS_HASH.to_owned();
    (0..n)
      .map(|i| {
        let mut e = NewAuditEntry::new(
          &actor,
          AuditAction::OpenClaim,
          EntityType::Claim,
          Uuid::new_v4(),
          json!({ "i": i }),
        )
        .seal(&prev, crate::now());
        e.seq = i as i64 + 1;
        prev.clone_from(&e.hash);
        e
      })
      .collect()
  }

  #[test]
  fn intact_chain_verifies() {
    let entries = chain(4);
    let report = verify_chain(&entries);
    assert!(report.is_intact());
    assert_eq!(report.entries_checked, 4);
  }

  #[test]
  fn reparsed_float_metadata_keeps_its_hash() {
    let actor = Actor::new("it-1", Role::ItAdmin);
    let sealed = NewAuditEntry::new(
      &actor,
      AuditAction::CloseClaim,
      EntityType::Claim,
      Uuid::new_v4(),
      json!({ "distance": 160.3 - 150.1, "start": 150.1, "end": 109.89999999999999 }),
    )
    .seal(GENESIS_HASH, crate::now());

    let mut reloaded = sealed.clone();
    reloaded.metadata = serde_json::from_str(&sealed.metadata.to_string()).unwrap();
    assert_eq!(reloaded.metadata, sealed.metadata);
    assert_eq!(reloaded.compute_hash(), sealed.hash);
  }

  #[test]
  fn edited_metadata_breaks_chain_at_that_entry() {
    let mut entries = chain(4);
    entries[2].metadata = json!({ "i": 99 });
    let report = verify_chain(&entries);
    assert_eq!(report.first_broken, Some(3));
  }

  #[test]
  fn removed_entry_breaks_link() {
    let mut entries = chain(3);
    entries.remove(1);
    assert_eq!(verify_chain(&entries).first_broken, Some(3));
  }

  #[test]
  fn changes_skip_equal_values() {
    let mut c = Changes::new();
    c.track("notes", &Some("a"), &Some("a")).unwrap();
    assert!(c.is_empty());
    c.track("notes", &Some("a"), &None::<&str>).unwrap();
    assert!(c.contains("notes"));
  }
}
