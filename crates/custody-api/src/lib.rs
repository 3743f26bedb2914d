//! JSON REST API for the custody ledger.
//!
//! Exposes an axum [`Router`] backed by any [`custody_core::store::CustodyStore`].
//! Authentication and TLS are the caller's responsibility; the acting
//! identity arrives in headers (see [`caller`]).
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", custody_api::api_router(store.clone()))
//! ```

pub mod audit;
pub mod caller;
pub mod claims;
pub mod error;
pub mod notifications;
pub mod resources;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use custody_core::store::CustodyStore;

pub use caller::Caller;
pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: CustodyStore + 'static,
{
  Router::new()
    // Resources
    .route("/resources", get(resources::list::<S>).post(resources::create::<S>))
    .route("/resources/{id}", get(resources::get_one::<S>).patch(resources::update::<S>))
    .route("/resources/{id}/state", put(resources::set_state::<S>))
    .route(
      "/resources/{id}/claims",
      get(claims::list_for_resource::<S>).post(claims::open::<S>),
    )
    // Claims
    .route("/claims", get(claims::list::<S>))
    .route("/claims/{id}", get(claims::get_one::<S>).patch(claims::amend::<S>))
    .route("/claims/{id}/close", post(claims::close::<S>))
    .route("/claims/{id}/readings/{phase}", post(claims::record_reading::<S>))
    // Audit
    .route("/audit", get(audit::list::<S>))
    .route("/audit/verify", get(audit::verify::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/{id}/read", post(notifications::mark_read::<S>))
    .with_state(store)
}
