//! # tg-audit
//!
//! Append-only audit records for toolgate.
//!
//! Every terminal tool-call outcome (allow executed, deny, approval
//! resolution) becomes an [`AuditEntry`]. Entries are hashed with
//! `SHA-256(prev_hash || canonical_json(entry))` so each row commits to
//! everything before it; the canonicalization is documented in
//! [`canonical`] and must stay stable across releases.

pub mod canonical;
pub mod entry;
pub mod error;
pub mod writer;

pub use canonical::canonical_json;
pub use entry::AuditEntry;
pub use error::AuditError;
pub use writer::{compute_hash, AuditWriter};
