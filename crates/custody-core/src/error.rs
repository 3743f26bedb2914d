//! Error types for `custody-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::resource::ResourceState;

/// How a caller is expected to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  /// The referenced resource, claim or notification does not exist.
  NotFound,
  /// A domain invariant rejected the request; the caller holds a stale view
  /// or lost a race. Never retried automatically.
  Conflict,
  /// A precondition is unmet; the caller must supply missing data.
  Precondition,
  /// The input itself is malformed.
  Invalid,
  /// Transient; safe to retry with backoff.
  Retryable,
  /// The store failed. Fatal for the current call.
  Internal,
}

/// Implemented by every error type that crosses a crate boundary, so outer
/// layers can map failures without knowing the concrete backend.
pub trait Classify {
  fn class(&self) -> ErrorClass;

  fn is_retryable(&self) -> bool { self.class() == ErrorClass::Retryable }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("resource not found: {0}")]
  ResourceNotFound(Uuid),

  #[error("claim not found: {0}")]
  ClaimNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("resource {id} is not available (state: {state})")]
  ResourceNotAvailable { id: Uuid, state: ResourceState },

  #[error("resource {0} already has an active claim")]
  AlreadyClaimed(Uuid),

  #[error("claim {0} is not active")]
  NotActive(Uuid),

  #[error("claim {0} is still active")]
  NotClosed(Uuid),

  #[error("custody proof incomplete: {0}")]
  ProofIncomplete(String),

  #[error("end reading {end} is below start reading {start}")]
  ReadingNotMonotonic { start: f64, end: f64 },

  #[error("start reading already recorded for claim {0}")]
  ReadingAlreadyRecorded(Uuid),

  #[error("resource code already in use: {0:?}")]
  DuplicateCode(String),

  #[error("cannot move resource from {from} to {to}")]
  InvalidStateChange { from: ResourceState, to: ResourceState },

  #[error("invalid input: {0}")]
  Validation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Classify for Error {
  fn class(&self) -> ErrorClass {
    match self {
      Self::ResourceNotFound(_)
      | Self::ClaimNotFound(_)
      | Self::NotificationNotFound(_) => ErrorClass::NotFound,
      Self::ResourceNotAvailable { .. }
      | Self::AlreadyClaimed(_)
      | Self::NotActive(_)
      | Self::NotClosed(_)
      | Self::ReadingAlreadyRecorded(_)
      | Self::DuplicateCode(_)
      | Self::InvalidStateChange { .. } => ErrorClass::Conflict,
      Self::ProofIncomplete(_) => ErrorClass::Precondition,
      Self::ReadingNotMonotonic { .. } | Self::Validation(_) => ErrorClass::Invalid,
      Self::Serialization(_) => ErrorClass::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
