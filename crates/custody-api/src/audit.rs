//! Handlers for `/audit` endpoints. Both are restricted to staff.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use custody_core::{
  audit::{AuditAction, AuditEntry, AuditQuery, ChainReport, EntityType},
  store::{CustodyStore, Page, PageRequest},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub action:      Option<AuditAction>,
  pub actor_id:    Option<String>,
  pub entity_type: Option<EntityType>,
  pub entity_id:   Option<Uuid>,
  pub from:        Option<DateTime<Utc>>,
  pub to:          Option<DateTime<Utc>>,
  pub q:           Option<String>,
  pub page:        Option<u32>,
  pub page_size:   Option<u32>,
}

/// `GET /audit`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<AuditEntry>>, ApiError>
where
  S: CustodyStore,
{
  caller.require_staff()?;
  let query = AuditQuery {
    action:      params.action,
    actor_id:    params.actor_id,
    entity_type: params.entity_type,
    entity_id:   params.entity_id,
    from:        params.from,
    to:          params.to,
    text:        params.q,
    page:        PageRequest::new(params.page, params.page_size),
  };
  let page = store.list_audit(&query).await.map_err(ApiError::store)?;
  Ok(Json(page))
}

/// `GET /audit/verify`
pub async fn verify<S>(
  State(store): State<Arc<S>>,
  caller: Caller,
) -> Result<Json<ChainReport>, ApiError>
where
  S: CustodyStore,
{
  caller.require_staff()?;
  let report = store.verify_audit_chain().await.map_err(ApiError::store)?;
  Ok(Json(report))
}
