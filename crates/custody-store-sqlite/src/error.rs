//! Error type for `custody-store-sqlite`.

use custody_core::{Classify, ErrorClass};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] custody_core::Error),

  /// The write lock could not be acquired within the busy timeout.
  #[error("timed out waiting for the database lock")]
  LockTimeout,

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unrecognised column value: {0}")]
  Decode(String),

  #[error("database schema version {found} is newer than supported version {supported}")]
  SchemaTooNew { found: u32, supported: u32 },
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    match err.sqlite_error_code() {
      Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::LockTimeout,
      _ => Self::Sqlite(err),
    }
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Rusqlite(err) => err.into(),
      other => Self::Database(other),
    }
  }
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::Core(err) => err.class(),
      Self::LockTimeout => ErrorClass::Retryable,
      _ => ErrorClass::Internal,
    }
  }
}

/// True for a `UNIQUE` constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
