//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use custody_core::{Classify, ErrorClass};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A store or domain failure, carrying its classification.
  #[error("{source}")]
  Store {
    class:  ErrorClass,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },
}

impl ApiError {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    Self::Store { class: err.class(), source: Box::new(err) }
  }
}

impl From<custody_core::Error> for ApiError {
  fn from(err: custody_core::Error) -> Self { Self::store(err) }
}

fn class_name(class: ErrorClass) -> &'static str {
  match class {
    ErrorClass::NotFound => "not_found",
    ErrorClass::Conflict => "conflict",
    ErrorClass::Precondition => "precondition",
    ErrorClass::Invalid => "invalid",
    ErrorClass::Retryable => "retryable",
    ErrorClass::Internal => "internal",
  }
}

pub fn status_for(class: ErrorClass) -> StatusCode {
  match class {
    ErrorClass::NotFound => StatusCode::NOT_FOUND,
    ErrorClass::Conflict => StatusCode::CONFLICT,
    ErrorClass::Precondition => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorClass::Invalid => StatusCode::BAD_REQUEST,
    ErrorClass::Retryable => StatusCode::SERVICE_UNAVAILABLE,
    ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, class, message) = match &self {
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.clone()),
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "invalid", m.clone()),
      ApiError::Store { class, source } => {
        if *class == ErrorClass::Internal {
          tracing::error!(error = %source, "store failure");
        }
        (status_for(*class), class_name(*class), source.to_string())
      }
    };

    let mut res = (status, Json(json!({ "error": message, "class": class }))).into_response();
    if status == StatusCode::SERVICE_UNAVAILABLE {
      res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    }
    res
  }
}
