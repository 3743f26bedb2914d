//! Handlers for the caller's own notification inbox.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use custody_core::{notification::Notification, store::CustodyStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{caller::Caller, error::ApiError};

const DEFAULT_LIMIT: u32 = 100;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub limit: Option<u32>,
}

/// `GET /notifications`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Caller(actor): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: CustodyStore,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, DEFAULT_LIMIT);
  let inbox = store
    .list_notifications(actor.id, limit)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(inbox))
}

/// `POST /notifications/{id}/read`
///
/// Another recipient's notification answers 404.
pub async fn mark_read<S>(
  State(store): State<Arc<S>>,
  Caller(actor): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError>
where
  S: CustodyStore,
{
  let notification = store
    .mark_notification_read(id, actor.id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(notification))
}
