//! SQLite backend for the shala school-data and identity stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. The `schools` table is shaped at
//! runtime by the [`registry`] module, which is the sole writer of structural
//! changes.

mod encode;
mod identity;
mod registry;
mod schema;
mod stats;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
