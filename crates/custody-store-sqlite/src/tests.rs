//! Integration tests for `SqliteStore` against in-memory and temp-file
//! databases.

use std::{path::PathBuf, time::Duration};

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use custody_core::{
  Classify, Error as CoreError, ErrorClass,
  actor::{Actor, Role},
  audit::{AuditAction, AuditQuery, EntityType},
  claim::{ClaimAmendment, ClaimFilter, ClaimStatus, CloseAttrs, OpenAttrs},
  notification::{NewNotification, NotificationSink},
  reading::{ReadingInput, ReadingPhase},
  resource::{Document, NewResource, ResourceKind, ResourcePatch, ResourceQuery, ResourceState},
  store::{CustodyStore, PageRequest},
};

use crate::{Error, SCHEMA_VERSION, SqliteStore, StoreOptions};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn it_admin() -> Actor { Actor::new("it-1", Role::ItAdmin) }

fn admin() -> Actor { Actor::new("admin-1", Role::Admin) }

async fn laptop(s: &SqliteStore, code: &str) -> Uuid {
  s.create_resource(it_admin(), NewResource::new(ResourceKind::Asset, code, "laptop"))
    .await
    .unwrap()
    .resource_id
}

async fn car(s: &SqliteStore, plate: &str) -> Uuid {
  s.create_resource(admin(), NewResource::new(ResourceKind::Vehicle, plate, "car"))
    .await
    .unwrap()
    .resource_id
}

async fn count(s: &SqliteStore, table: &'static str) -> i64 {
  s.raw(move |conn| Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
    .await
    .unwrap()
}

fn core_err(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

/// A database file removed (with its WAL companions) on drop.
struct TempDb(PathBuf);

impl TempDb {
  fn new() -> Self {
    Self(std::env::temp_dir().join(format!("custody-test-{}.db", Uuid::new_v4())))
  }
}

impl Drop for TempDb {
  fn drop(&mut self) {
    for suffix in ["", "-wal", "-shm"] {
      let _ = std::fs::remove_file(format!("{}{suffix}", self.0.display()));
    }
  }
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopening_keeps_schema_version_and_data() {
  let db = TempDb::new();
  let id = {
    let s = SqliteStore::open(&db.0).await.unwrap();
    assert_eq!(s.schema_version().await.unwrap(), SCHEMA_VERSION);
    laptop(&s, "IT-0001").await
  };

  let s = SqliteStore::open(&db.0).await.unwrap();
  assert_eq!(s.schema_version().await.unwrap(), SCHEMA_VERSION);
  assert!(s.get_resource(id).await.unwrap().is_some());
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_resource_with_documents() {
  let s = store().await;
  let input = NewResource::new(ResourceKind::Vehicle, "KA-01-1234", "car")
    .with_attribute("model", "Swift")
    .with_document(Document {
      kind:         "insurance".into(),
      valid_from:   NaiveDate::from_ymd_opt(2025, 1, 1),
      valid_to:     NaiveDate::from_ymd_opt(2025, 12, 31),
      evidence_ref: Some("ins.pdf".into()),
    });

  let created = s.create_resource(admin(), input).await.unwrap();
  assert_eq!(created.state, ResourceState::Free);

  let fetched = s.get_resource(created.resource_id).await.unwrap().unwrap();
  assert_eq!(fetched, created);
  assert_eq!(s.documented_resource_ids().await.unwrap(), vec![created.resource_id]);
}

#[tokio::test]
async fn duplicate_code_is_a_conflict() {
  let s = store().await;
  laptop(&s, "IT-0001").await;

  let err = s
    .create_resource(it_admin(), NewResource::new(ResourceKind::Asset, "IT-0001", "mouse"))
    .await
    .unwrap_err();
  assert_eq!(err.class(), ErrorClass::Conflict);
  assert!(matches!(core_err(err), CoreError::DuplicateCode(code) if code == "IT-0001"));
  assert_eq!(count(&s, "resources").await, 1);
}

#[tokio::test]
async fn update_resource_audits_only_real_changes() {
  let s = store().await;
  let id = laptop(&s, "IT-0001").await;

  let patch = ResourcePatch {
    attributes: Some(json!({ "brand": "Dell" }).as_object().cloned().unwrap()),
    ..Default::default()
  };
  let updated = s.update_resource(id, patch.clone(), it_admin()).await.unwrap();
  assert_eq!(updated.attributes["brand"], "Dell");

  // Same patch again: nothing changes, nothing is written.
  s.update_resource(id, patch, it_admin()).await.unwrap();

  let query = AuditQuery { action: Some(AuditAction::UpdateResource), ..Default::default() };
  let entries = s.list_audit(&query).await.unwrap();
  assert_eq!(entries.total, 1);
  assert_eq!(
    entries.data[0].metadata["changes"]["attributes.brand"],
    json!({ "from": null, "to": "Dell" })
  );
}

#[tokio::test]
async fn admin_state_change_cannot_touch_claimed() {
  let s = store().await;
  let id = laptop(&s, "IT-0001").await;

  let err = s.update_resource_state(id, ResourceState::Claimed, it_admin()).await.unwrap_err();
  assert!(matches!(core_err(err), CoreError::InvalidStateChange { .. }));

  let r = s.update_resource_state(id, ResourceState::Maintenance, it_admin()).await.unwrap();
  assert_eq!(r.state, ResourceState::Maintenance);

  let err = s
    .open_claim(id, "H".into(), it_admin(), OpenAttrs::default())
    .await
    .unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::ResourceNotAvailable { state: ResourceState::Maintenance, .. }
  ));
}

#[tokio::test]
async fn list_resources_filters_and_pages() {
  let s = store().await;
  for i in 0..5 {
    laptop(&s, &format!("IT-{i:04}")).await;
  }
  car(&s, "KA-01-1234").await;

  let query = ResourceQuery {
    kind: Some(ResourceKind::Asset),
    page: PageRequest::new(Some(2), Some(2)),
    ..Default::default()
  };
  let page = s.list_resources(&query).await.unwrap();
  assert_eq!(page.total, 5);
  assert_eq!(page.data.len(), 2);

  let query = ResourceQuery { text: Some("ka-01".into()), ..Default::default() };
  let page = s.list_resources(&query).await.unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.data[0].code, "KA-01-1234");
}

// ─── Claim engine ────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_then_second_open_is_rejected() {
  let s = store().await;
  let id = laptop(&s, "A1").await;

  let claim = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  assert_eq!(claim.status, ClaimStatus::Active);
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Claimed);

  let err = s.open_claim(id, "Y".into(), it_admin(), OpenAttrs::default()).await.unwrap_err();
  assert!(matches!(
    core_err(err),
    CoreError::ResourceNotAvailable { state: ResourceState::Claimed, .. }
  ));

  let active = s.find_active_claim(id).await.unwrap().unwrap();
  assert_eq!(active.holder_id, "X");
  assert_eq!(count(&s, "claims").await, 1);
}

#[tokio::test]
async fn open_missing_resource_is_not_found() {
  let s = store().await;
  let err = s
    .open_claim(Uuid::new_v4(), "X".into(), it_admin(), OpenAttrs::default())
    .await
    .unwrap_err();
  assert_eq!(err.class(), ErrorClass::NotFound);
}

#[tokio::test]
async fn close_frees_resource_and_second_close_is_not_active() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let claim = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();

  let attrs = CloseAttrs { condition_on_close: Some("good".into()), ..Default::default() };
  let closed = s.close_claim(claim.claim_id, it_admin(), attrs, false).await.unwrap();
  assert_eq!(closed.status, ClaimStatus::Closed);
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Free);
  assert!(s.find_active_claim(id).await.unwrap().is_none());

  let err = s
    .close_claim(claim.claim_id, it_admin(), CloseAttrs::default(), false)
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::NotActive(_)));
}

#[tokio::test]
async fn concurrent_closes_one_wins() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let claim = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();

  let (a, b) = tokio::join!(
    s.close_claim(claim.claim_id, it_admin(), CloseAttrs::default(), false),
    s.close_claim(claim.claim_id, admin(), CloseAttrs::default(), true),
  );
  let outcomes = [a, b];
  assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);

  let loser = outcomes.into_iter().find_map(Result::err).unwrap();
  assert!(matches!(core_err(loser), CoreError::NotActive(_)));
  assert_eq!(count(&s, "audit_entries").await, 3);
}

#[tokio::test]
async fn concurrent_opens_across_connections_one_wins() {
  let db = TempDb::new();
  let a = SqliteStore::open(&db.0).await.unwrap();
  let b = SqliteStore::open(&db.0).await.unwrap();
  let id = laptop(&a, "A1").await;

  let (x, y) = tokio::join!(
    a.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()),
    b.open_claim(id, "Y".into(), it_admin(), OpenAttrs::default()),
  );
  let outcomes = [x, y];
  assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);

  let loser = outcomes.into_iter().find_map(Result::err).unwrap();
  assert_eq!(loser.class(), ErrorClass::Conflict);

  let claims = a.list_claims(&ClaimFilter::for_resource(id)).await.unwrap();
  assert_eq!(claims.total, 1);
}

#[tokio::test]
async fn vehicle_readings_gate_the_return() {
  let s = store().await;
  let id = car(&s, "KA-01-1234").await;
  let attrs = OpenAttrs {
    start_reading: Some(ReadingInput::new(150.0, "start.jpg")),
    ..Default::default()
  };
  let claim = s.open_claim(id, "D".into(), admin(), attrs).await.unwrap();

  let err = s
    .close_claim(claim.claim_id, admin(), CloseAttrs::default(), false)
    .await
    .unwrap_err();
  assert_eq!(err.class(), ErrorClass::Precondition);

  let err = s
    .record_custody_reading(
      claim.claim_id,
      ReadingPhase::End,
      ReadingInput::new(120.0, "end.jpg"),
      admin(),
    )
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::ReadingNotMonotonic { .. }));

  let reading = s
    .record_custody_reading(
      claim.claim_id,
      ReadingPhase::End,
      ReadingInput::new(160.0, "end.jpg"),
      admin(),
    )
    .await
    .unwrap();
  assert_eq!(reading.distance(), Some(10.0));

  s.close_claim(claim.claim_id, admin(), CloseAttrs::default(), false).await.unwrap();
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Free);

  let stored = s.get_custody_reading(claim.claim_id).await.unwrap().unwrap();
  assert_eq!(stored, reading);
}

#[tokio::test]
async fn start_reading_is_recorded_once() {
  let s = store().await;
  let id = car(&s, "KA-01-1234").await;
  let claim = s.open_claim(id, "D".into(), admin(), OpenAttrs::default()).await.unwrap();

  s.record_custody_reading(claim.claim_id, ReadingPhase::Start, ReadingInput::new(5.0, "s.jpg"), admin())
    .await
    .unwrap();
  let err = s
    .record_custody_reading(
      claim.claim_id,
      ReadingPhase::Start,
      ReadingInput::new(6.0, "s2.jpg"),
      admin(),
    )
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::ReadingAlreadyRecorded(_)));
}

#[tokio::test]
async fn amend_toggles_retirement_and_resource_state() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let claim = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  s.close_claim(claim.claim_id, it_admin(), CloseAttrs::default(), false).await.unwrap();

  let retire = ClaimAmendment {
    retired: Some(true),
    retire_reason: Some("cracked screen".into()),
    ..Default::default()
  };
  let amended = s.amend_closed_claim(claim.claim_id, it_admin(), retire).await.unwrap();
  assert_eq!(amended.status, ClaimStatus::Retired);
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Retired);

  let unretire = ClaimAmendment { retired: Some(false), ..Default::default() };
  s.amend_closed_claim(claim.claim_id, it_admin(), unretire.clone()).await.unwrap();
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Free);

  // No-op amendment writes nothing.
  let before = count(&s, "audit_entries").await;
  s.amend_closed_claim(claim.claim_id, it_admin(), unretire).await.unwrap();
  assert_eq!(count(&s, "audit_entries").await, before);

  let query = AuditQuery {
    action: Some(AuditAction::AmendClosedClaim),
    entity_id: Some(claim.claim_id),
    ..Default::default()
  };
  let entries = s.list_audit(&query).await.unwrap();
  assert_eq!(entries.total, 2);
  assert_eq!(
    entries.data[0].metadata["changes"]["status"],
    json!({ "from": "retired", "to": "closed" })
  );
}

#[tokio::test]
async fn unretire_keeps_a_later_administrative_retirement() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let claim = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  s.close_claim(claim.claim_id, it_admin(), CloseAttrs::default(), true).await.unwrap();

  s.update_resource_state(id, ResourceState::Free, it_admin()).await.unwrap();
  s.update_resource_state(id, ResourceState::Retired, it_admin()).await.unwrap();

  let unretire = ClaimAmendment { retired: Some(false), ..Default::default() };
  let amended = s.amend_closed_claim(claim.claim_id, it_admin(), unretire).await.unwrap();
  assert_eq!(amended.status, ClaimStatus::Closed);
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Retired);
}

#[tokio::test]
async fn unretire_keeps_retirement_held_by_another_claim() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let first = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  s.close_claim(first.claim_id, it_admin(), CloseAttrs::default(), false).await.unwrap();
  let second = s.open_claim(id, "Y".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  s.close_claim(second.claim_id, it_admin(), CloseAttrs::default(), true).await.unwrap();

  let retire = ClaimAmendment { retired: Some(true), ..Default::default() };
  s.amend_closed_claim(first.claim_id, it_admin(), retire).await.unwrap();

  let unretire = ClaimAmendment { retired: Some(false), ..Default::default() };
  s.amend_closed_claim(first.claim_id, it_admin(), unretire.clone()).await.unwrap();
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Retired);

  s.amend_closed_claim(second.claim_id, it_admin(), unretire).await.unwrap();
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Free);
}

#[tokio::test]
async fn future_start_time_is_rejected() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let attrs = OpenAttrs {
    opened_at: Some(custody_core::now() + chrono::Duration::hours(1)),
    ..Default::default()
  };
  let err = s.open_claim(id, "X".into(), it_admin(), attrs).await.unwrap_err();
  assert_eq!(err.class(), ErrorClass::Invalid);
  assert_eq!(count(&s, "claims").await, 0);
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Free);
}

#[tokio::test]
async fn amend_active_claim_is_not_closed() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let claim = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  let err = s
    .amend_closed_claim(claim.claim_id, it_admin(), ClaimAmendment::default())
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::NotClosed(_)));
}

// ─── Atomicity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_failure_rolls_back_the_open() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let audits = count(&s, "audit_entries").await;

  s.raw(|conn| {
    conn.execute_batch(
      "CREATE TRIGGER audit_offline BEFORE INSERT ON audit_entries
       BEGIN SELECT RAISE(ABORT, 'audit sink offline'); END;",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let err = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap_err();
  assert_eq!(err.class(), ErrorClass::Internal);

  assert_eq!(count(&s, "claims").await, 0);
  assert_eq!(count(&s, "audit_entries").await, audits);
  assert_eq!(s.get_resource(id).await.unwrap().unwrap().state, ResourceState::Free);
}

#[tokio::test]
async fn held_write_lock_surfaces_as_retryable_timeout() {
  let db = TempDb::new();
  let options = StoreOptions { busy_timeout: Duration::from_millis(50) };
  let s = SqliteStore::open_with(&db.0, options).await.unwrap();

  let blocker = rusqlite::Connection::open(&db.0).unwrap();
  blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

  let err = s
    .create_resource(it_admin(), NewResource::new(ResourceKind::Asset, "A1", "laptop"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::LockTimeout), "got {err:?}");
  assert!(err.is_retryable());

  blocker.execute_batch("ROLLBACK").unwrap();
  laptop(&s, "A1").await;
}

// ─── Audit chain ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_chain_verifies_and_detects_tampering() {
  let s = store().await;
  let id = laptop(&s, "A1").await;
  let claim = s.open_claim(id, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  s.close_claim(claim.claim_id, it_admin(), CloseAttrs::default(), false).await.unwrap();

  let report = s.verify_audit_chain().await.unwrap();
  assert!(report.is_intact());
  assert_eq!(report.entries_checked, 3);

  s.raw(|conn| {
    conn.execute_batch(
      "DROP TRIGGER audit_entries_no_update;
       UPDATE audit_entries SET metadata = '{\"holder_id\":\"Z\"}' WHERE seq = 2;",
    )?;
    Ok(())
  })
  .await
  .unwrap();

  let report = s.verify_audit_chain().await.unwrap();
  assert_eq!(report.first_broken, Some(2));
}

#[tokio::test]
async fn fractional_readings_keep_the_chain_intact() {
  let s = store().await;
  for (plate, start, end) in [("KA-01-1234", 150.1, 160.3), ("KA-01-5678", 100.1, 109.89999999999999)]
  {
    let id = car(&s, plate).await;
    let attrs = OpenAttrs {
      start_reading: Some(ReadingInput::new(start, "start.jpg")),
      ..Default::default()
    };
    let claim = s.open_claim(id, "D".into(), admin(), attrs).await.unwrap();
    s.record_custody_reading(claim.claim_id, ReadingPhase::End, ReadingInput::new(end, "end.jpg"), admin())
      .await
      .unwrap();
    s.close_claim(claim.claim_id, admin(), CloseAttrs::default(), false).await.unwrap();
  }

  let report = s.verify_audit_chain().await.unwrap();
  assert!(report.is_intact(), "{report:?}");
  assert_eq!(report.entries_checked as i64, count(&s, "audit_entries").await);
}

#[tokio::test]
async fn audit_rows_are_immutable() {
  let s = store().await;
  laptop(&s, "A1").await;
  let result = s
    .raw(|conn| Ok(conn.execute("DELETE FROM audit_entries", [])?))
    .await;
  assert!(result.is_err());
  assert_eq!(count(&s, "audit_entries").await, 1);
}

#[tokio::test]
async fn open_audit_names_holder_from_directory() {
  struct Names;
  impl custody_core::directory::HolderDirectory for Names {
    fn display_name(&self, holder_id: &str) -> Option<String> {
      (holder_id == "E7").then(|| "Asha Rao".to_owned())
    }

    fn alert_recipients(&self) -> Vec<String> { Vec::new() }
  }

  let s = store().await.with_directory(std::sync::Arc::new(Names));
  let id = laptop(&s, "A1").await;
  let claim = s.open_claim(id, "E7".into(), it_admin(), OpenAttrs::default()).await.unwrap();

  let query = AuditQuery {
    entity_type: Some(EntityType::Claim),
    entity_id: Some(claim.claim_id),
    ..Default::default()
  };
  let entries = s.list_audit(&query).await.unwrap();
  assert_eq!(entries.data[0].action, AuditAction::OpenClaim);
  assert_eq!(entries.data[0].metadata["holder_name"], "Asha Rao");
  assert_eq!(entries.data[0].actor_role, Role::ItAdmin);
}

// ─── Claim listing ───────────────────────────────────────────────────────────

#[tokio::test]
async fn list_claims_filters_history_holder_and_kind() {
  let s = store().await;
  let a1 = laptop(&s, "A1").await;
  let a2 = laptop(&s, "A2").await;
  let v1 = car(&s, "KA-01-1234").await;

  let c1 = s.open_claim(a1, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  s.close_claim(c1.claim_id, it_admin(), CloseAttrs::default(), true).await.unwrap();
  s.open_claim(a2, "X".into(), it_admin(), OpenAttrs::default()).await.unwrap();
  s.open_claim(v1, "Y".into(), admin(), OpenAttrs::default()).await.unwrap();

  let history = s.list_claims(&ClaimFilter::history()).await.unwrap();
  assert_eq!(history.total, 1);
  assert_eq!(history.data[0].claim_id, c1.claim_id);

  let by_holder = ClaimFilter { holder_id: Some("X".into()), ..Default::default() };
  assert_eq!(s.list_claims(&by_holder).await.unwrap().total, 2);

  let vehicles = ClaimFilter { resource_kind: Some(ResourceKind::Vehicle), ..Default::default() };
  let page = s.list_claims(&vehicles).await.unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.data[0].holder_id, "Y");

  let not_retired = ClaimFilter { retired: Some(false), ..Default::default() };
  assert_eq!(s.list_claims(&not_retired).await.unwrap().total, 2);

  let today = ClaimFilter { opened_on: Some(c1.opened_at.date_naive()), ..Default::default() };
  assert_eq!(s.list_claims(&today).await.unwrap().total, 3);
}

// ─── Notifications ───────────────────────────────────────────────────────────

fn alert(recipient: &str, message: &str) -> NewNotification {
  NewNotification {
    recipient_id: recipient.into(),
    category:     "resource_doc_reminder".into(),
    message:      message.into(),
    metadata:     json!({}),
  }
}

#[tokio::test]
async fn notifications_dedupe_key_and_inbox() {
  let s = store().await;
  s.send(alert("admin-1", "first")).await.unwrap();
  let latest = s.send(alert("admin-1", "second")).await.unwrap();
  s.send(alert("admin-2", "first")).await.unwrap();

  assert!(s.has_sent("admin-1", "resource_doc_reminder", "first").await.unwrap());
  assert!(!s.has_sent("admin-1", "resource_doc_reminder", "third").await.unwrap());
  assert!(!s.has_sent("admin-1", "other", "first").await.unwrap());

  let inbox = s.list_notifications("admin-1".into(), 100).await.unwrap();
  assert_eq!(inbox.len(), 2);
  assert_eq!(inbox[0].notification_id, latest.notification_id);
  assert!(!inbox[0].read);
}

#[tokio::test]
async fn only_the_recipient_marks_read() {
  let s = store().await;
  let n = s.send(alert("admin-1", "hello")).await.unwrap();

  let err = s
    .mark_notification_read(n.notification_id, "admin-2".into())
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), CoreError::NotificationNotFound(_)));

  let read = s.mark_notification_read(n.notification_id, "admin-1".into()).await.unwrap();
  assert!(read.read);
}

#[tokio::test]
async fn send_unique_inserts_once_across_connections() {
  let db = TempDb::new();
  let a = SqliteStore::open(&db.0).await.unwrap();
  let b = SqliteStore::open(&db.0).await.unwrap();

  let (x, y) = tokio::join!(
    a.send_unique(alert("admin-1", "expires in 5 day(s)")),
    b.send_unique(alert("admin-1", "expires in 5 day(s)")),
  );
  let sent = [x.unwrap(), y.unwrap()];
  assert_eq!(sent.iter().filter(|n| n.is_some()).count(), 1);
  assert_eq!(count(&a, "notifications").await, 1);

  assert!(a.send_unique(alert("admin-2", "expires in 5 day(s)")).await.unwrap().is_some());
  assert!(b.send_unique(alert("admin-1", "expires in 5 day(s)")).await.unwrap().is_none());
}
