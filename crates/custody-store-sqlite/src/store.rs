//! [`SqliteStore`], the SQLite implementation of [`CustodyStore`].

use std::{path::Path, sync::Arc, time::Duration};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use custody_core::{
  actor::Actor,
  audit::{AuditAction, AuditEntry, AuditQuery, ChainReport, EntityType, NewAuditEntry},
  claim::{Claim, ClaimAmendment, ClaimFilter, ClaimStatus, CloseAttrs, OpenAttrs},
  directory::{HolderDirectory, NoDirectory},
  engine,
  notification::{NewNotification, Notification, NotificationSink},
  reading::{CustodyReading, ReadingInput, ReadingPhase},
  resource::{NewResource, Resource, ResourcePatch, ResourceQuery, ResourceState},
  store::{CustodyStore, Page},
};

use crate::{Result, audit, ledger, notify, registry, schema};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How long a writer waits for the database lock before failing with
  /// [`Error::LockTimeout`](crate::Error::LockTimeout).
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { busy_timeout: Duration::from_secs(5) } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A custody store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  directory: Arc<dyn HolderDirectory>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and apply pending migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, StoreOptions::default()).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let store = Self { conn, directory: Arc::new(NoDirectory) };
    let version = store
      .run(move |conn| {
        schema::configure(conn, options.busy_timeout)?;
        schema::migrate(conn)
      })
      .await?;
    debug!(version, "custody store ready");
    Ok(store)
  }

  /// Use `directory` to enrich audit metadata with holder names.
  pub fn with_directory(mut self, directory: Arc<dyn HolderDirectory>) -> Self {
    self.directory = directory;
    self
  }

  /// The schema version currently recorded in the database.
  pub async fn schema_version(&self) -> Result<u32> {
    self.read(schema::user_version).await
  }

  /// Run `f` on the connection thread.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.run(move |conn| f(conn)).await
  }

  /// Run `f` inside a `BEGIN IMMEDIATE` transaction. The database write lock
  /// is taken before `f` reads anything and held until commit; any error
  /// rolls the whole transaction back.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .run(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
      })
      .await
  }

  #[cfg(test)]
  pub(crate) async fn raw<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.run(f).await
  }
}

// ─── CustodyStore impl ───────────────────────────────────────────────────────

impl CustodyStore for SqliteStore {
  type Error = crate::Error;

  // ── Resource registry ─────────────────────────────────────────────────────

  async fn create_resource(&self, actor: Actor, input: NewResource) -> Result<Resource> {
    let resource = input.into_resource(custody_core::now())?;

    let resource = self
      .write(move |tx| {
        registry::insert(tx, &resource)?;
        audit::record(
          tx,
          NewAuditEntry::new(
            &actor,
            AuditAction::CreateResource,
            EntityType::Resource,
            resource.resource_id,
            json!({
              "code":     resource.code,
              "kind":     resource.kind,
              "category": resource.category,
            }),
          ),
          resource.created_at,
        )?;
        Ok(resource)
      })
      .await?;

    info!(resource_id = %resource.resource_id, code = %resource.code, "resource created");
    Ok(resource)
  }

  async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>> {
    self.read(move |conn| registry::load(conn, id)).await
  }

  async fn list_resources(&self, query: &ResourceQuery) -> Result<Page<Resource>> {
    let query = query.clone();
    self.read(move |conn| registry::list(conn, &query)).await
  }

  async fn update_resource_state(
    &self,
    id: Uuid,
    state: ResourceState,
    actor: Actor,
  ) -> Result<Resource> {
    self
      .write(move |tx| {
        let resource = registry::require(tx, id)?;
        engine::check_admin_state_change(&resource, state)?;
        if resource.state == state {
          return Ok(resource);
        }

        let now = custody_core::now();
        registry::set_state(tx, id, state, now)?;
        audit::record(
          tx,
          NewAuditEntry::new(
            &actor,
            AuditAction::UpdateResourceState,
            EntityType::Resource,
            id,
            json!({ "code": resource.code, "from": resource.state, "to": state }),
          ),
          now,
        )?;
        Ok(Resource { state, updated_at: now, ..resource })
      })
      .await
  }

  async fn update_resource(
    &self,
    id: Uuid,
    patch: ResourcePatch,
    actor: Actor,
  ) -> Result<Resource> {
    self
      .write(move |tx| {
        let current = registry::require(tx, id)?;
        let now = custody_core::now();
        let (next, changes) = patch.apply(&current, now)?;
        if changes.is_empty() {
          return Ok(current);
        }

        registry::save(tx, &next)?;
        audit::record(
          tx,
          NewAuditEntry::new(
            &actor,
            AuditAction::UpdateResource,
            EntityType::Resource,
            id,
            json!({ "code": next.code, "changes": changes.into_value() }),
          ),
          now,
        )?;
        Ok(next)
      })
      .await
  }

  async fn documented_resource_ids(&self) -> Result<Vec<Uuid>> {
    self.read(registry::documented_ids).await
  }

  // ── Claim ledger ──────────────────────────────────────────────────────────

  async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>> {
    self.read(move |conn| ledger::load(conn, id)).await
  }

  async fn find_active_claim(&self, resource_id: Uuid) -> Result<Option<Claim>> {
    self.read(move |conn| ledger::find_active(conn, resource_id)).await
  }

  async fn list_claims(&self, filter: &ClaimFilter) -> Result<Page<Claim>> {
    let filter = filter.clone();
    self.read(move |conn| ledger::list(conn, &filter)).await
  }

  // ── Claim engine ──────────────────────────────────────────────────────────

  async fn open_claim(
    &self,
    resource_id: Uuid,
    holder_id: String,
    actor: Actor,
    attrs: OpenAttrs,
  ) -> Result<Claim> {
    let holder_name = self.directory.display_name(holder_id.trim());

    let claim = self
      .write(move |tx| {
        let resource = registry::require(tx, resource_id)?;
        let active = ledger::find_active(tx, resource_id)?;
        let now = custody_core::now();
        let plan = engine::open(&resource, active.as_ref(), &holder_id, &actor, &attrs, now)?;

        ledger::insert(tx, &plan.claim)?;
        if let Some(reading) = &plan.start_reading {
          ledger::save_reading(tx, reading)?;
        }
        registry::set_state(tx, resource_id, ResourceState::Claimed, now)?;
        audit::record(
          tx,
          NewAuditEntry::new(
            &actor,
            AuditAction::OpenClaim,
            EntityType::Claim,
            plan.claim.claim_id,
            json!({
              "resource_id":   resource_id,
              "code":          resource.code,
              "holder_id":     plan.claim.holder_id,
              "holder_name":   holder_name,
              "opened_at":     plan.claim.opened_at,
              "start_reading": plan.start_reading.as_ref().map(|r| r.start.value),
            }),
          ),
          now,
        )?;
        Ok(plan.claim)
      })
      .await?;

    info!(
      claim_id = %claim.claim_id,
      resource_id = %claim.resource_id,
      holder_id = %claim.holder_id,
      "claim opened"
    );
    Ok(claim)
  }

  async fn close_claim(
    &self,
    claim_id: Uuid,
    actor: Actor,
    attrs: CloseAttrs,
    retire: bool,
  ) -> Result<Claim> {
    let claim = self
      .write(move |tx| {
        let claim = ledger::require(tx, claim_id)?;
        let resource = registry::require(tx, claim.resource_id)?;
        let reading = ledger::load_reading(tx, claim_id)?;
        let now = custody_core::now();
        let plan = engine::close(&claim, &resource, reading.as_ref(), &actor, &attrs, retire, now)?;

        ledger::save(tx, &plan.claim)?;
        registry::set_state(tx, resource.resource_id, plan.resource_state, now)?;
        audit::record(
          tx,
          NewAuditEntry::new(
            &actor,
            AuditAction::CloseClaim,
            EntityType::Claim,
            claim_id,
            json!({
              "resource_id":        resource.resource_id,
              "code":               resource.code,
              "holder_id":          plan.claim.holder_id,
              "status":             plan.claim.status,
              "closed_at":          plan.claim.closed_at,
              "condition_on_close": plan.claim.condition_on_close,
              "retire_reason":      plan.claim.retire_reason,
              "resource_state":     plan.resource_state,
              "distance":           reading.as_ref().and_then(CustodyReading::distance),
            }),
          ),
          now,
        )?;
        Ok(plan.claim)
      })
      .await?;

    info!(
      claim_id = %claim.claim_id,
      resource_id = %claim.resource_id,
      status = claim.status.as_str(),
      "claim closed"
    );
    Ok(claim)
  }

  async fn amend_closed_claim(
    &self,
    claim_id: Uuid,
    actor: Actor,
    patch: ClaimAmendment,
  ) -> Result<Claim> {
    self
      .write(move |tx| {
        let claim = ledger::require(tx, claim_id)?;
        let resource = registry::require(tx, claim.resource_id)?;
        let active = ledger::find_active(tx, claim.resource_id)?;
        let retired_elsewhere = claim.status == ClaimStatus::Retired
          && patch.retired == Some(false)
          && audit::retirement_held_elsewhere(tx, claim.resource_id, claim_id)?;
        let now = custody_core::now();
        let amendment = engine::amend(
          &claim,
          &resource,
          active.as_ref(),
          retired_elsewhere,
          &actor,
          &patch,
          now,
        )?;
        if amendment.changes.is_empty() {
          return Ok(claim);
        }

        ledger::save(tx, &amendment.claim)?;
        if let Some(state) = amendment.resource_state {
          registry::set_state(tx, resource.resource_id, state, now)?;
        }
        audit::record(
          tx,
          NewAuditEntry::new(
            &actor,
            AuditAction::AmendClosedClaim,
            EntityType::Claim,
            claim_id,
            json!({
              "resource_id": resource.resource_id,
              "changes":     amendment.changes.into_value(),
            }),
          ),
          now,
        )?;
        Ok(amendment.claim)
      })
      .await
  }

  async fn record_custody_reading(
    &self,
    claim_id: Uuid,
    phase: ReadingPhase,
    input: ReadingInput,
    actor: Actor,
  ) -> Result<CustodyReading> {
    self
      .write(move |tx| {
        let claim = ledger::require(tx, claim_id)?;
        let resource = registry::require(tx, claim.resource_id)?;
        let existing = ledger::load_reading(tx, claim_id)?;
        let now = custody_core::now();
        let reading =
          engine::record_reading(&claim, &resource, existing.as_ref(), phase, input, &actor, now)?;

        ledger::save_reading(tx, &reading)?;
        let capture = match phase {
          ReadingPhase::Start => Some(&reading.start),
          ReadingPhase::End => reading.end.as_ref(),
        };
        audit::record(
          tx,
          NewAuditEntry::new(
            &actor,
            AuditAction::RecordReading,
            EntityType::Claim,
            claim_id,
            json!({
              "resource_id":  resource.resource_id,
              "phase":        phase,
              "value":        capture.map(|c| c.value),
              "evidence_ref": capture.map(|c| c.evidence_ref.as_str()),
            }),
          ),
          now,
        )?;
        Ok(reading)
      })
      .await
  }

  async fn get_custody_reading(&self, claim_id: Uuid) -> Result<Option<CustodyReading>> {
    self.read(move |conn| ledger::load_reading(conn, claim_id)).await
  }

  // ── Audit ─────────────────────────────────────────────────────────────────

  async fn list_audit(&self, query: &AuditQuery) -> Result<Page<AuditEntry>> {
    let query = query.clone();
    self.read(move |conn| audit::list(conn, &query)).await
  }

  async fn verify_audit_chain(&self) -> Result<ChainReport> {
    let report = self.read(audit::verify).await?;
    if let Some(seq) = report.first_broken {
      tracing::warn!(seq, checked = report.entries_checked, "audit chain broken");
    }
    Ok(report)
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn list_notifications(&self, recipient_id: String, limit: u32) -> Result<Vec<Notification>> {
    self.read(move |conn| notify::list(conn, &recipient_id, limit)).await
  }

  async fn mark_notification_read(&self, id: Uuid, recipient_id: String) -> Result<Notification> {
    self.write(move |tx| notify::mark_read(tx, id, &recipient_id)).await
  }
}

// ─── NotificationSink impl ───────────────────────────────────────────────────

impl NotificationSink for SqliteStore {
  type Error = crate::Error;

  async fn send(&self, notification: NewNotification) -> Result<Notification> {
    self
      .run(move |conn| notify::insert(conn, notification, custody_core::now()))
      .await
  }

  async fn send_unique(&self, notification: NewNotification) -> Result<Option<Notification>> {
    self
      .write(move |tx| {
        let NewNotification { recipient_id, category, message, .. } = &notification;
        if notify::exists(tx, recipient_id, category, message)? {
          return Ok(None);
        }
        notify::insert(tx, notification, custody_core::now()).map(Some)
      })
      .await
  }

  async fn has_sent(&self, recipient_id: &str, category: &str, message: &str) -> Result<bool> {
    let (recipient_id, category, message) =
      (recipient_id.to_owned(), category.to_owned(), message.to_owned());
    self
      .read(move |conn| notify::exists(conn, &recipient_id, &category, &message))
      .await
  }
}
