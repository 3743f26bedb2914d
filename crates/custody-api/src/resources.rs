//! Handlers for `/resources` endpoints.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/resources` | Optional `kind`, `state`, `category`, `q`, `page`, `page_size` |
//! | `POST`  | `/resources` | Body: [`NewResource`]; returns 201 |
//! | `GET`   | `/resources/{id}` | 404 if not found |
//! | `PATCH` | `/resources/{id}` | Body: [`ResourcePatch`] |
//! | `PUT`   | `/resources/{id}/state` | Body: `{"state":"maintenance"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use custody_core::{
  resource::{NewResource, Resource, ResourceKind, ResourcePatch, ResourceQuery, ResourceState},
  store::{CustodyStore, Page, PageRequest},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

/// A resource together with its kind-specific state label.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceView {
  #[serde(flatten)]
  pub resource:    Resource,
  pub state_label: String,
}

impl From<Resource> for ResourceView {
  fn from(resource: Resource) -> Self {
    let state_label = resource.state.label_for(resource.kind).to_owned();
    Self { resource, state_label }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub kind:      Option<ResourceKind>,
  pub state:     Option<ResourceState>,
  pub category:  Option<String>,
  /// Free text over code and attributes.
  pub q:         Option<String>,
  pub page:      Option<u32>,
  pub page_size: Option<u32>,
}

/// `GET /resources`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  _caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<ResourceView>>, ApiError>
where
  S: CustodyStore,
{
  let query = ResourceQuery {
    kind:     params.kind,
    state:    params.state,
    category: params.category,
    text:     params.q,
    page:     PageRequest::new(params.page, params.page_size),
  };

  let page = store.list_resources(&query).await.map_err(ApiError::store)?;
  Ok(Json(Page {
    data:      page.data.into_iter().map(ResourceView::from).collect(),
    page:      page.page,
    page_size: page.page_size,
    total:     page.total,
  }))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /resources`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Json(body): Json<NewResource>,
) -> Result<impl IntoResponse, ApiError>
where
  S: CustodyStore,
{
  let actor = caller.require_staff()?;
  let resource = store.create_resource(actor, body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(ResourceView::from(resource))))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /resources/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  _caller: Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<ResourceView>, ApiError>
where
  S: CustodyStore,
{
  let resource = store
    .get_resource(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("resource {id} not found")))?;
  Ok(Json(resource.into()))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /resources/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(patch): Json<ResourcePatch>,
) -> Result<Json<ResourceView>, ApiError>
where
  S: CustodyStore,
{
  let actor = caller.require_staff()?;
  let resource = store.update_resource(id, patch, actor).await.map_err(ApiError::store)?;
  Ok(Json(resource.into()))
}

#[derive(Debug, Deserialize)]
pub struct StateBody {
  pub state: ResourceState,
}

/// `PUT /resources/{id}/state`
pub async fn set_state<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Path(id): Path<Uuid>,
  Json(body): Json<StateBody>,
) -> Result<Json<ResourceView>, ApiError>
where
  S: CustodyStore,
{
  let actor = caller.require_staff()?;
  let resource = store
    .update_resource_state(id, body.state, actor)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(resource.into()))
}
