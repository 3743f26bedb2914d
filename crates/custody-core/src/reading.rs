//! Custody readings: odometer-style measurements captured at the start and
//! end of a vehicle claim, each backed by an evidentiary image reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingPhase {
  Start,
  End,
}

/// A reading as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingInput {
  pub value:        f64,
  pub evidence_ref: String,
}

impl ReadingInput {
  pub fn new(value: f64, evidence_ref: impl Into<String>) -> Self {
    Self { value, evidence_ref: evidence_ref.into() }
  }

  pub fn validate(&self) -> Result<()> {
    if !self.value.is_finite() || self.value < 0.0 {
      return Err(Error::Validation(format!(
        "reading must be a non-negative number, got {}",
        self.value
      )));
    }
    if self.evidence_ref.trim().is_empty() {
      return Err(Error::Validation("reading requires an evidence reference".into()));
    }
    Ok(())
  }
}

/// A reading as stored, stamped with who captured it and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingCapture {
  pub value:        f64,
  pub evidence_ref: String,
  pub recorded_at:  DateTime<Utc>,
  pub recorded_by:  String,
}

impl ReadingCapture {
  pub fn from_input(input: ReadingInput, recorded_by: &str, recorded_at: DateTime<Utc>) -> Self {
    Self {
      value: input.value,
      evidence_ref: input.evidence_ref,
      recorded_at,
      recorded_by: recorded_by.to_owned(),
    }
  }
}

/// The start/end reading pair of one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustodyReading {
  pub claim_id:    Uuid,
  pub resource_id: Uuid,
  pub start:       ReadingCapture,
  pub end:         Option<ReadingCapture>,
}

impl CustodyReading {
  /// Distance covered during custody, once the end reading exists.
  pub fn distance(&self) -> Option<f64> {
    self.end.as_ref().map(|end| end.value - self.start.value)
  }
}
