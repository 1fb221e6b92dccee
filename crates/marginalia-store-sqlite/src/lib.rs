//! SQLite backend for Marginalia review comments.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod provider;
mod schema;

pub mod error;

pub use error::{Error, Result};
pub use provider::SqliteProvider;

#[cfg(test)]
mod tests;
