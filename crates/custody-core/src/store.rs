//! The `CustodyStore` trait and supporting paging types.
//!
//! The trait is implemented by storage backends (e.g. `custody-store-sqlite`).
//! Higher layers (`custody-api`, `custody-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Classify,
  actor::Actor,
  audit::{AuditEntry, AuditQuery, ChainReport},
  claim::{Claim, ClaimAmendment, ClaimFilter, CloseAttrs, OpenAttrs},
  notification::Notification,
  reading::{CustodyReading, ReadingInput, ReadingPhase},
  resource::{NewResource, Resource, ResourcePatch, ResourceQuery, ResourceState},
};

// ─── Paging ──────────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 200;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
  pub page:      u32,
  pub page_size: u32,
}

impl Default for PageRequest {
  fn default() -> Self { Self { page: 1, page_size: DEFAULT_PAGE_SIZE } }
}

impl PageRequest {
  pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
    Self {
      page:      page.unwrap_or(1).max(1),
      page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    }
  }

  pub fn limit(&self) -> u32 { self.page_size.clamp(1, MAX_PAGE_SIZE) }

  pub fn offset(&self) -> u64 { u64::from(self.page.max(1) - 1) * u64::from(self.limit()) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
  pub data:      Vec<T>,
  pub page:      u32,
  pub page_size: u32,
  pub total:     u64,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a custody store backend.
///
/// Every mutating method runs as one atomic transaction that also writes the
/// audit entry describing it: either the state change and its audit record
/// both persist, or neither does.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CustodyStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Resource registry ─────────────────────────────────────────────────

  /// Register a resource in the `Free` state.
  fn create_resource(
    &self,
    actor: Actor,
    input: NewResource,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + '_;

  /// Retrieve a resource by UUID. Returns `None` if not found.
  fn get_resource(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Resource>, Self::Error>> + Send + '_;

  fn list_resources<'a>(
    &'a self,
    query: &'a ResourceQuery,
  ) -> impl Future<Output = Result<Page<Resource>, Self::Error>> + Send + 'a;

  /// Administrative state change (free, maintenance, retired).
  fn update_resource_state(
    &self,
    id: Uuid,
    state: ResourceState,
    actor: Actor,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + '_;

  /// Edit descriptive fields. Writes an audit entry only if something changed.
  fn update_resource(
    &self,
    id: Uuid,
    patch: ResourcePatch,
    actor: Actor,
  ) -> impl Future<Output = Result<Resource, Self::Error>> + Send + '_;

  /// IDs of resources with at least one dated document.
  fn documented_resource_ids(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Claim ledger ──────────────────────────────────────────────────────

  fn get_claim(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Claim>, Self::Error>> + Send + '_;

  fn find_active_claim(
    &self,
    resource_id: Uuid,
  ) -> impl Future<Output = Result<Option<Claim>, Self::Error>> + Send + '_;

  fn list_claims<'a>(
    &'a self,
    filter: &'a ClaimFilter,
  ) -> impl Future<Output = Result<Page<Claim>, Self::Error>> + Send + 'a;

  // ── Claim engine ──────────────────────────────────────────────────────

  /// Give `holder_id` custody of a free resource.
  fn open_claim(
    &self,
    resource_id: Uuid,
    holder_id: String,
    actor: Actor,
    attrs: OpenAttrs,
  ) -> impl Future<Output = Result<Claim, Self::Error>> + Send + '_;

  /// End an active claim, optionally retiring the resource.
  fn close_claim(
    &self,
    claim_id: Uuid,
    actor: Actor,
    attrs: CloseAttrs,
    retire: bool,
  ) -> impl Future<Output = Result<Claim, Self::Error>> + Send + '_;

  /// Correct a closed or retired claim.
  fn amend_closed_claim(
    &self,
    claim_id: Uuid,
    actor: Actor,
    patch: ClaimAmendment,
  ) -> impl Future<Output = Result<Claim, Self::Error>> + Send + '_;

  fn record_custody_reading(
    &self,
    claim_id: Uuid,
    phase: ReadingPhase,
    input: ReadingInput,
    actor: Actor,
  ) -> impl Future<Output = Result<CustodyReading, Self::Error>> + Send + '_;

  fn get_custody_reading(
    &self,
    claim_id: Uuid,
  ) -> impl Future<Output = Result<Option<CustodyReading>, Self::Error>> + Send + '_;

  // ── Audit ─────────────────────────────────────────────────────────────

  fn list_audit<'a>(
    &'a self,
    query: &'a AuditQuery,
  ) -> impl Future<Output = Result<Page<AuditEntry>, Self::Error>> + Send + 'a;

  /// Recompute the audit hash chain from the first entry.
  fn verify_audit_chain(
    &self,
  ) -> impl Future<Output = Result<ChainReport, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Latest notifications for `recipient_id`, newest first.
  fn list_notifications(
    &self,
    recipient_id: String,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Mark a notification read. Fails with not-found unless it belongs to
  /// `recipient_id`.
  fn mark_notification_read(
    &self,
    id: Uuid,
    recipient_id: String,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_request_clamps_inputs() {
    let p = PageRequest::new(Some(0), Some(10_000));
    assert_eq!(p.page, 1);
    assert_eq!(p.limit(), MAX_PAGE_SIZE);
    assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
  }
}
