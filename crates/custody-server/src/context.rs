//! The application context: store, directory and scanner, built once at
//! startup and torn down on shutdown.

use std::sync::Arc;

use anyhow::Context as _;
use axum::{Json, Router, extract::State, routing::post};
use custody_api::{ApiError, Caller};
use custody_core::{ErrorClass, directory::HolderDirectory};
use custody_store_sqlite::SqliteStore;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
  ServerConfig,
  directory::StaticDirectory,
  scanner::{ExpiryScanner, ScanReport, ScannerHandle},
};

pub type Scanner = ExpiryScanner<SqliteStore>;

pub struct AppContext {
  pub config:  ServerConfig,
  pub store:   Arc<SqliteStore>,
  pub scanner: Arc<Scanner>,
  scan_task:   Option<ScannerHandle>,
}

impl AppContext {
  /// Open the store (applying migrations) and assemble the services around
  /// it. Nothing runs in the background until [`AppContext::start`].
  pub async fn open(config: ServerConfig) -> anyhow::Result<Self> {
    let directory: Arc<dyn HolderDirectory> = Arc::new(StaticDirectory::new(
      config.directory.names.clone(),
      config.directory.alert_recipients.clone(),
    ));

    let store_path = config.resolved_store_path();
    let store = SqliteStore::open_with(&store_path, config.store_options())
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?
      .with_directory(directory.clone());
    let store = Arc::new(store);

    let scanner = Arc::new(ExpiryScanner::new(
      store.clone(),
      directory,
      config.expiry_policy(),
    ));

    Ok(Self { config, store, scanner, scan_task: None })
  }

  /// Start the background expiry scanner, unless disabled by configuration.
  pub fn start(&mut self) {
    if self.scan_task.is_some() {
      return;
    }
    match self.config.scan_interval() {
      Some(every) => {
        info!(interval_secs = every.as_secs(), "starting expiry scanner");
        self.scan_task = Some(self.scanner.clone().spawn(every));
      }
      None => info!("expiry scanner disabled"),
    }
  }

  /// Stop background work and wait for it to finish.
  pub async fn shutdown(mut self) {
    if let Some(task) = self.scan_task.take() {
      task.shutdown().await;
    }
    info!("custody services stopped");
  }

  /// The HTTP surface: the JSON API plus the manual scan trigger.
  pub fn router(&self) -> Router {
    let admin = Router::new()
      .route("/admin/expiry-scan", post(trigger_scan))
      .with_state(self.scanner.clone());

    custody_api::api_router(self.store.clone())
      .merge(admin)
      .layer(TraceLayer::new_for_http())
  }
}

/// `POST /admin/expiry-scan`
async fn trigger_scan(
  State(scanner): State<Arc<Scanner>>,
  caller: Caller,
) -> Result<Json<ScanReport>, ApiError> {
  caller.require_staff()?;
  let report = scanner
    .run_once()
    .await
    .map_err(|e| ApiError::Store { class: ErrorClass::Internal, source: e.into() })?;
  Ok(Json(report))
}
