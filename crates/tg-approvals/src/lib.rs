//! # tg-approvals
//!
//! Human-in-the-loop approval coordination.
//!
//! A tool call that policy routes to `approval` becomes an
//! [`ApprovalRecord`] in the KV store with a TTL. Approvers decide
//! through signed chat callbacks or signed URLs; decisions are idempotent
//! once a record is terminal, and a quorum of distinct approvers is
//! required to flip a record to `allow`. Callers can block on
//! [`ApprovalCoordinator::wait`], which listens on pub/sub and polls
//! every second because the channel alone is allowed to drop messages.

pub mod callback;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod record;

pub use callback::{verify_signed_url, verify_webhook, CallbackError, DEFAULT_TOLERANCE_SECS};
pub use coordinator::{new_pending_id, ApprovalCoordinator};
pub use error::ApprovalError;
pub use notify::ChatNotifier;
pub use record::{ApprovalRecord, ApprovalStatus};
