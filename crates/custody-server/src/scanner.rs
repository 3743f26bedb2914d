//! Periodic document expiry scan.
//!
//! Runs once when started and then on every tick of the configured interval.
//! Each resource is handled on its own: a failure is logged and counted and
//! the scan moves on.

use std::{sync::Arc, time::Duration};

use anyhow::Context as _;
use chrono::NaiveDate;
use custody_core::{
  directory::HolderDirectory,
  expiry::{ExpiryPolicy, REMINDER_CATEGORY, alert_metadata},
  notification::{NewNotification, NotificationSink},
  store::CustodyStore,
};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of one scan cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
  pub resources_scanned:  u64,
  pub notifications_sent: u64,
  pub duplicates_skipped: u64,
  pub failures:           u64,
}

pub struct ExpiryScanner<S> {
  store:     Arc<S>,
  directory: Arc<dyn HolderDirectory>,
  policy:    ExpiryPolicy,
}

impl<S> ExpiryScanner<S>
where
  S: CustodyStore + NotificationSink + 'static,
{
  pub fn new(store: Arc<S>, directory: Arc<dyn HolderDirectory>, policy: ExpiryPolicy) -> Self {
    Self { store, directory, policy }
  }

  /// Scan against the local calendar date.
  pub async fn run_once(&self) -> anyhow::Result<ScanReport> {
    self.run_once_on(chrono::Local::now().date_naive()).await
  }

  pub async fn run_once_on(&self, today: NaiveDate) -> anyhow::Result<ScanReport> {
    let mut report = ScanReport::default();
    let recipients = self.directory.alert_recipients();
    if recipients.is_empty() {
      debug!("no alert recipients configured; skipping expiry scan");
      return Ok(report);
    }

    let ids = self
      .store
      .documented_resource_ids()
      .await
      .context("failed to list documented resources")?;

    for id in ids {
      report.resources_scanned += 1;
      if let Err(e) = self.scan_resource(id, today, &recipients, &mut report).await {
        report.failures += 1;
        warn!(resource_id = %id, error = %format!("{e:#}"), "expiry check failed");
      }
    }

    info!(
      %today,
      scanned = report.resources_scanned,
      sent = report.notifications_sent,
      skipped = report.duplicates_skipped,
      failures = report.failures,
      "expiry scan finished"
    );
    Ok(report)
  }

  async fn scan_resource(
    &self,
    id: Uuid,
    today: NaiveDate,
    recipients: &[String],
    report: &mut ScanReport,
  ) -> anyhow::Result<()> {
    let Some(resource) = self.store.get_resource(id).await? else {
      debug!(resource_id = %id, "resource vanished during scan");
      return Ok(());
    };

    for doc in &resource.documents {
      let Some(alert) = self.policy.evaluate(&resource, doc, today) else {
        continue;
      };
      let metadata = alert_metadata(&resource, doc, today);

      for recipient in recipients {
        let notification = NewNotification {
          recipient_id: recipient.clone(),
          category:     REMINDER_CATEGORY.to_owned(),
          message:      alert.message().to_owned(),
          metadata:     metadata.clone(),
        };

        if alert.dedupe() {
          let sent = self
            .store
            .send_unique(notification)
            .await
            .with_context(|| format!("failed to notify {recipient}"))?;
          if sent.is_none() {
            report.duplicates_skipped += 1;
            continue;
          }
        } else {
          self
            .store
            .send(notification)
            .await
            .with_context(|| format!("failed to notify {recipient}"))?;
        }
        report.notifications_sent += 1;
      }
    }
    Ok(())
  }

  /// Run immediately, then every `every`, until the returned handle is shut
  /// down.
  pub fn spawn(self: Arc<Self>, every: Duration) -> ScannerHandle {
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        tokio::select! {
          _ = ticker.tick() => {
            if let Err(e) = self.run_once().await {
              error!(error = %format!("{e:#}"), "expiry scan cycle failed");
            }
          }
          _ = stop_rx.changed() => break,
        }
      }
      debug!("expiry scanner stopped");
    });

    ScannerHandle { stop: stop_tx, task }
  }
}

/// Owner of a running scanner task.
pub struct ScannerHandle {
  stop: watch::Sender<bool>,
  task: JoinHandle<()>,
}

impl ScannerHandle {
  /// Signal the loop and wait for an in-flight cycle to finish.
  pub async fn shutdown(self) {
    let _ = self.stop.send(true);
    if let Err(e) = self.task.await {
      error!(error = %e, "expiry scanner task panicked");
    }
  }
}
