//! Actor extractor.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! identity in the `x-actor-id` and `x-actor-role` headers, which are trusted
//! as given.

use axum::{extract::FromRequestParts, http::request::Parts};
use custody_core::actor::{Actor, Role};

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The actor on whose behalf a request is made.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl Caller {
  pub fn is_staff(&self) -> bool { matches!(self.0.role, Role::Admin | Role::ItAdmin) }

  /// Administrative endpoints are closed to employees.
  pub fn require_staff(&self) -> Result<Actor, ApiError> {
    if self.is_staff() {
      return Ok(self.0.clone());
    }
    Err(ApiError::Forbidden(format!("{} may not perform administrative actions", self.0.id)))
  }

  /// Staff act for anyone; an employee only for themselves.
  pub fn require_self_or_staff(&self, holder_id: &str) -> Result<Actor, ApiError> {
    if self.is_staff() || self.0.id == holder_id {
      return Ok(self.0.clone());
    }
    Err(ApiError::Forbidden(format!("{} may not act for {holder_id}", self.0.id)))
  }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
  parts
    .headers
    .get(name)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for Caller
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let id = header(parts, ACTOR_ID_HEADER)
      .ok_or_else(|| ApiError::Unauthorized(format!("missing {ACTOR_ID_HEADER} header")))?;
    let role = header(parts, ACTOR_ROLE_HEADER)
      .ok_or_else(|| ApiError::Unauthorized(format!("missing {ACTOR_ROLE_HEADER} header")))?
      .parse::<Role>()
      .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Caller(Actor::new(id, role)))
  }
}
