//! Notifications and the sink they are delivered to.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
  pub recipient_id: String,
  pub category:     String,
  pub message:      String,
  pub metadata:     Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub recipient_id:    String,
  pub category:        String,
  pub message:         String,
  pub metadata:        Value,
  pub read:            bool,
  pub created_at:      DateTime<Utc>,
}

/// Fire-and-forget persistence of alerts.
///
/// Deduplication is content-based: a notification with the identical
/// (recipient, category, message) triple counts as already sent.
/// `send_unique` applies that rule atomically; `has_sent` only reports it.
pub trait NotificationSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send(
    &self,
    notification: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Send unless an identical (recipient, category, message) notification
  /// exists, checking and inserting atomically. `None` means it was a
  /// duplicate.
  fn send_unique(
    &self,
    notification: NewNotification,
  ) -> impl Future<Output = Result<Option<Notification>, Self::Error>> + Send + '_;

  fn has_sent<'a>(
    &'a self,
    recipient_id: &'a str,
    category: &'a str,
    message: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
