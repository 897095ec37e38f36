//! # tg-store
//!
//! SQLite-backed persistence for toolgate: registered policy versions,
//! the rollout row, per-tenant overrides, and the audit log.
//!
//! The store is synchronous — every operation is a single short
//! statement — and internally serialized behind a `Mutex<Connection>`.
//! Async callers hold the lock only for the duration of one statement.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{AuditRow, RolloutRow, SqlStore, VersionRow};
