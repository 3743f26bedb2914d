//! Claims: one holder's custody of one resource for one interval.
//!
//! Claims are never deleted. At most one claim per resource may be `Active`
//! at any time; the claim engine and the storage layer both enforce this.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  reading::ReadingInput,
  resource::ResourceKind,
  store::PageRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
  Active,
  Closed,
  Retired,
}

impl ClaimStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Closed => "closed",
      Self::Retired => "retired",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
  pub claim_id:           Uuid,
  pub resource_id:        Uuid,
  /// External identity of the holder (e.g. an employee id).
  pub holder_id:          String,
  pub opened_at:          DateTime<Utc>,
  pub opened_by:          String,
  pub closed_at:          Option<DateTime<Utc>>,
  pub closed_by:          Option<String>,
  pub status:             ClaimStatus,
  pub notes:              Option<String>,
  pub condition_on_open:  Option<String>,
  pub condition_on_close: Option<String>,
  pub retire_reason:      Option<String>,
  pub retired_by:         Option<String>,
  pub updated_at:         DateTime<Utc>,
}

impl Claim {
  pub fn is_active(&self) -> bool { self.status == ClaimStatus::Active }
}

// ─── Operation inputs ────────────────────────────────────────────────────────

/// Attributes supplied when opening a claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAttrs {
  /// Backdate the start of custody; defaults to now.
  pub opened_at:         Option<DateTime<Utc>>,
  pub notes:             Option<String>,
  pub condition_on_open: Option<String>,
  /// Start-of-custody reading, for vehicles.
  pub start_reading:     Option<ReadingInput>,
}

/// Attributes supplied when closing a claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseAttrs {
  /// Backdate the end of custody; defaults to now.
  pub closed_at:          Option<DateTime<Utc>>,
  /// Replaces the claim notes when present.
  pub notes:              Option<String>,
  pub condition_on_close: Option<String>,
  /// Only used when the claim is closed with `retire = true`.
  pub retire_reason:      Option<String>,
}

/// Corrections to a claim that is already closed or retired.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimAmendment {
  pub notes:              Option<String>,
  pub condition_on_close: Option<String>,
  /// Toggle retirement after the fact.
  pub retired:            Option<bool>,
  pub retire_reason:      Option<String>,
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Parameters for [`CustodyStore::list_claims`](crate::store::CustodyStore::list_claims).
/// Results are ordered by `opened_at`, newest first.
#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
  pub claim_id:      Option<Uuid>,
  pub resource_id:   Option<Uuid>,
  pub holder_id:     Option<String>,
  pub resource_kind: Option<ResourceKind>,
  /// Empty means any status.
  pub statuses:      Vec<ClaimStatus>,
  pub retired:       Option<bool>,
  pub opened_from:   Option<DateTime<Utc>>,
  pub opened_to:     Option<DateTime<Utc>>,
  /// Whole UTC day on which custody started.
  pub opened_on:     Option<NaiveDate>,
  /// Whole UTC day on which custody ended.
  pub closed_on:     Option<NaiveDate>,
  pub page:          PageRequest,
}

impl ClaimFilter {
  /// Closed and retired claims.
  pub fn history() -> Self {
    Self { statuses: vec![ClaimStatus::Closed, ClaimStatus::Retired], ..Self::default() }
  }

  pub fn for_resource(resource_id: Uuid) -> Self {
    Self { resource_id: Some(resource_id), ..Self::default() }
  }

  /// Parse a status parameter: a single status, a comma-separated list, or
  /// `history`.
  pub fn parse_statuses(raw: &str) -> crate::Result<Vec<ClaimStatus>> {
    let raw = raw.trim().to_lowercase();
    if raw == "history" {
      return Ok(vec![ClaimStatus::Closed, ClaimStatus::Retired]);
    }
    raw
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| match s {
        "active" => Ok(ClaimStatus::Active),
        "closed" => Ok(ClaimStatus::Closed),
        "retired" => Ok(ClaimStatus::Retired),
        other => Err(crate::Error::Validation(format!("unknown claim status: {other:?}"))),
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_statuses_accepts_lists_and_history() {
    assert_eq!(
      ClaimFilter::parse_statuses("History").unwrap(),
      vec![ClaimStatus::Closed, ClaimStatus::Retired]
    );
    assert_eq!(
      ClaimFilter::parse_statuses("active, retired").unwrap(),
      vec![ClaimStatus::Active, ClaimStatus::Retired]
    );
    assert!(ClaimFilter::parse_statuses("returned").is_err());
  }
}
