//! Core types and trait definitions for the custody ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the domain model (resources, claims, custody readings, audit entries,
//! notifications), the pure claim state machine, and the document expiry
//! policy. Storage backends implement [`store::CustodyStore`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod actor;
pub mod audit;
pub mod claim;
pub mod directory;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod notification;
pub mod reading;
pub mod resource;
pub mod store;

use chrono::{DateTime, SubsecRound as _, Utc};

pub use error::{Classify, Error, ErrorClass, Result};

/// The current instant, truncated to microseconds so that timestamps survive
/// a round-trip through storage unchanged.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }
