//! Notification rows.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use custody_core::{
  Error as CoreError,
  notification::{NewNotification, Notification},
};

use crate::{
  Result,
  encode::{NOTIFICATION_COLUMNS, RawNotification, encode_dt, encode_uuid},
};

/// Upper bound on a single inbox listing.
pub const MAX_LIST: u32 = 100;

pub fn insert(conn: &Connection, input: NewNotification, now: DateTime<Utc>) -> Result<Notification> {
  let notification = Notification {
    notification_id: Uuid::new_v4(),
    recipient_id:    input.recipient_id,
    category:        input.category,
    message:         input.message,
    metadata:        input.metadata,
    read:            false,
    created_at:      now,
  };

  conn.execute(
    "INSERT INTO notifications (
       notification_id, recipient_id, category, message, metadata, read, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
    params![
      encode_uuid(notification.notification_id),
      notification.recipient_id,
      notification.category,
      notification.message,
      notification.metadata.to_string(),
      encode_dt(notification.created_at),
    ],
  )?;
  Ok(notification)
}

pub fn exists(conn: &Connection, recipient_id: &str, category: &str, message: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM notifications
          WHERE recipient_id = ?1 AND category = ?2 AND message = ?3
          LIMIT 1",
        params![recipient_id, category, message],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

/// Latest notifications for a recipient, newest first.
pub fn list(conn: &Connection, recipient_id: &str, limit: u32) -> Result<Vec<Notification>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {NOTIFICATION_COLUMNS} FROM notifications
      WHERE recipient_id = ?1
      ORDER BY created_at DESC, rowid DESC
      LIMIT ?2"
  ))?;
  stmt
    .query_map(params![recipient_id, limit.clamp(1, MAX_LIST)], RawNotification::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?
    .into_iter()
    .map(RawNotification::into_notification)
    .collect()
}

/// Mark a notification read on behalf of its recipient. Someone else's
/// notification is reported as not found.
pub fn mark_read(conn: &Connection, id: Uuid, recipient_id: &str) -> Result<Notification> {
  let id_str = encode_uuid(id);
  let updated = conn.execute(
    "UPDATE notifications SET read = 1 WHERE notification_id = ?1 AND recipient_id = ?2",
    params![id_str, recipient_id],
  )?;
  if updated == 0 {
    return Err(CoreError::NotificationNotFound(id).into());
  }

  conn
    .query_row(
      &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = ?1"),
      params![id_str],
      RawNotification::from_row,
    )?
    .into_notification()
}
