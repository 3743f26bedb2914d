//! Document expiry policy.
//!
//! Decides, for one document on one day, whether an alert is due and what it
//! says. Threshold reminders carry no date in their text, so a repeated scan
//! produces an identical message that the sink deduplicates. Expired alerts
//! embed the scan date, so they are re-announced every day until the
//! document is renewed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::resource::{Document, Resource};

/// Notification category used for document alerts.
pub const REMINDER_CATEGORY: &str = "resource_doc_reminder";

pub const DEFAULT_THRESHOLDS: [u32; 5] = [15, 10, 5, 2, 1];

/// Whole calendar days from `today` until `valid_to`; negative once expired.
pub fn days_remaining(valid_to: NaiveDate, today: NaiveDate) -> i64 {
  (valid_to - today).num_days()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alert {
  Expired { message: String },
  Reminder { days: u32, message: String },
}

impl Alert {
  pub fn message(&self) -> &str {
    match self {
      Self::Expired { message } | Self::Reminder { message, .. } => message,
    }
  }

  /// Whether an identical earlier notification suppresses this one.
  pub fn dedupe(&self) -> bool { matches!(self, Self::Reminder { .. }) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryPolicy {
  /// Days-before-expiry at which a one-off reminder is sent.
  pub thresholds: Vec<u32>,
}

impl Default for ExpiryPolicy {
  fn default() -> Self { Self { thresholds: DEFAULT_THRESHOLDS.to_vec() } }
}

impl ExpiryPolicy {
  pub fn new(mut thresholds: Vec<u32>) -> Self {
    thresholds.sort_unstable_by(|a, b| b.cmp(a));
    thresholds.dedup();
    Self { thresholds }
  }

  pub fn evaluate(&self, resource: &Resource, doc: &Document, today: NaiveDate) -> Option<Alert> {
    let valid_to = doc.valid_to?;
    let days = days_remaining(valid_to, today);
    let subject = format!(
      "{} {} {}",
      resource.kind.title(),
      resource.code,
      doc.kind.to_uppercase()
    );

    if days < 0 {
      return Some(Alert::Expired {
        message: format!("{subject} document EXPIRED on {}", today.format("%Y-%m-%d")),
      });
    }
    let days = u32::try_from(days).ok()?;
    self.thresholds.contains(&days).then(|| Alert::Reminder {
      days,
      message: format!("{subject} expires in {days} day(s)"),
    })
  }
}

/// Metadata attached to a document alert.
pub fn alert_metadata(resource: &Resource, doc: &Document, today: NaiveDate) -> Value {
  json!({
    "resource_id":    resource.resource_id,
    "code":           resource.code,
    "kind":           resource.kind,
    "document":       doc.kind,
    "valid_to":       doc.valid_to,
    "days_remaining": doc.valid_to.map(|to| days_remaining(to, today)),
  })
}
