//! SQLite backend for the custody store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation runs inside one
//! `BEGIN IMMEDIATE` transaction together with its audit entry.

mod audit;
mod encode;
mod filter;
mod ledger;
mod notify;
mod registry;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
pub use store::{SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
