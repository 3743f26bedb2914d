//! Handlers for claim endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/resources/{id}/claims` | Body: [`OpenBody`]; returns 201 |
//! | `GET`   | `/resources/{id}/claims` | Claim history of one resource |
//! | `GET`   | `/claims` | Filters: see [`ListParams`] |
//! | `GET`   | `/claims/{id}` | Claim with its custody reading |
//! | `PATCH` | `/claims/{id}` | Body: [`ClaimAmendment`]; closed or retired claims only |
//! | `POST`  | `/claims/{id}/close` | Body: [`CloseBody`] |
//! | `POST`  | `/claims/{id}/readings/{start\|end}` | Body: `{"value":..,"evidence_ref":..}` |
//!
//! Staff may open, close and record readings for anyone. An employee may do
//! the same only on vehicles and only for their own claims, and may not
//! retire on close. Amendment is staff-only.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, NaiveDate, Utc};
use custody_core::{
  actor::Actor,
  claim::{Claim, ClaimAmendment, ClaimFilter, CloseAttrs, OpenAttrs},
  reading::{CustodyReading, ReadingInput, ReadingPhase},
  resource::{Resource, ResourceKind},
  store::{CustodyStore, Page, PageRequest},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

/// A claim together with its custody reading, if any.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimView {
  #[serde(flatten)]
  pub claim:   Claim,
  pub reading: Option<CustodyReading>,
}

// ─── Self-service ─────────────────────────────────────────────────────────────

async fn load_resource<S: CustodyStore>(store: &S, id: Uuid) -> Result<Resource, ApiError> {
  store
    .get_resource(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("resource {id} not found")))
}

fn require_vehicle(caller: &Caller, resource: &Resource) -> Result<(), ApiError> {
  if resource.kind == ResourceKind::Vehicle {
    return Ok(());
  }
  Err(ApiError::Forbidden(format!(
    "{} may not take custody of asset {}",
    caller.0.id, resource.code
  )))
}

/// The actor for a write on an existing claim: staff always, an employee
/// only on their own vehicle claim.
async fn authorize_holder<S: CustodyStore>(
  store: &S,
  caller: &Caller,
  claim_id: Uuid,
) -> Result<Actor, ApiError> {
  if caller.is_staff() {
    return Ok(caller.0.clone());
  }
  let claim = store
    .get_claim(claim_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("claim {claim_id} not found")))?;
  let actor = caller.require_self_or_staff(&claim.holder_id)?;
  require_vehicle(caller, &load_resource(store, claim.resource_id).await?)?;
  Ok(actor)
}

// ─── Open ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenBody {
  pub holder_id: String,
  #[serde(flatten)]
  pub attrs:     OpenAttrs,
}

/// `POST /resources/{id}/claims`
pub async fn open<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(resource_id): Path<Uuid>,
  Json(body): Json<OpenBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CustodyStore,
{
  let actor = caller.require_self_or_staff(&body.holder_id)?;
  if !caller.is_staff() {
    require_vehicle(&caller, &load_resource(&*store, resource_id).await?)?;
  }
  let claim = store
    .open_claim(resource_id, body.holder_id, actor, body.attrs)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(claim)))
}

// ─── Close ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CloseBody {
  /// Retire the resource instead of returning it to the pool.
  #[serde(default)]
  pub retire: bool,
  #[serde(flatten)]
  pub attrs:  CloseAttrs,
}

/// `POST /claims/{id}/close`
pub async fn close<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<CloseBody>,
) -> Result<Json<Claim>, ApiError>
where
  S: CustodyStore,
{
  let actor = if body.retire {
    caller.require_staff()?
  } else {
    authorize_holder(&*store, &caller, id).await?
  };
  let claim = store
    .close_claim(id, actor, body.attrs, body.retire)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(claim))
}

// ─── Amend ────────────────────────────────────────────────────────────────────

/// `PATCH /claims/{id}`
pub async fn amend<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(patch): Json<ClaimAmendment>,
) -> Result<Json<Claim>, ApiError>
where
  S: CustodyStore,
{
  let actor = caller.require_staff()?;
  let claim = store
    .amend_closed_claim(id, actor, patch)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(claim))
}

// ─── Readings ─────────────────────────────────────────────────────────────────

/// `POST /claims/{id}/readings/{phase}`
pub async fn record_reading<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path((id, phase)): Path<(Uuid, ReadingPhase)>,
  Json(input): Json<ReadingInput>,
) -> Result<Json<CustodyReading>, ApiError>
where
  S: CustodyStore,
{
  let actor = authorize_holder(&*store, &caller, id).await?;
  let reading = store
    .record_custody_reading(id, phase, input, actor)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(reading))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /claims/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  _caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<ClaimView>, ApiError>
where
  S: CustodyStore,
{
  let claim = store
    .get_claim(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("claim {id} not found")))?;
  let reading = store.get_custody_reading(id).await.map_err(ApiError::store)?;
  Ok(Json(ClaimView { claim, reading }))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub claim_id:    Option<Uuid>,
  pub resource_id: Option<Uuid>,
  pub holder_id:   Option<String>,
  pub kind:        Option<ResourceKind>,
  /// A status, a comma-separated list of statuses, or `history`.
  pub status:      Option<String>,
  pub retired:     Option<bool>,
  pub opened_from: Option<DateTime<Utc>>,
  pub opened_to:   Option<DateTime<Utc>>,
  pub opened_on:   Option<NaiveDate>,
  pub closed_on:   Option<NaiveDate>,
  pub page:        Option<u32>,
  pub page_size:   Option<u32>,
}

impl ListParams {
  fn into_filter(self) -> Result<ClaimFilter, ApiError> {
    let statuses = match self.status.as_deref() {
      Some(raw) => ClaimFilter::parse_statuses(raw)?,
      None => Vec::new(),
    };
    Ok(ClaimFilter {
      claim_id: self.claim_id,
      resource_id: self.resource_id,
      holder_id: self.holder_id,
      resource_kind: self.kind,
      statuses,
      retired: self.retired,
      opened_from: self.opened_from,
      opened_to: self.opened_to,
      opened_on: self.opened_on,
      closed_on: self.closed_on,
      page: PageRequest::new(self.page, self.page_size),
    })
  }
}

/// `GET /claims`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  _caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Claim>>, ApiError>
where
  S: CustodyStore,
{
  let filter = params.into_filter()?;
  let page = store.list_claims(&filter).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /resources/{id}/claims`
pub async fn list_for_resource<S>(
  State(store): State<Arc<S>>,
  _caller: Caller,
  Path(resource_id): Path<Uuid>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Claim>>, ApiError>
where
  S: CustodyStore,
{
  let filter = ClaimFilter { resource_id: Some(resource_id), ..params.into_filter()? };
  let page = store.list_claims(&filter).await.map_err(ApiError::store)?;
  Ok(Json(page))
}
