// coordinator.rs — Create / get / decide / wait for pending approvals.
//
// Concurrency model: decide is a read-modify-CAS loop keyed on the
// record's rev counter. Two approvers racing both apply in some serial
// order; whichever CAS lands on a terminal record simply returns that
// record unchanged (terminal states are absorbing). decided_ts is set in
// the same write that flips status, so it is assigned exactly once.
//
// wait never trusts pub/sub alone: the channel may drop messages while a
// subscriber reconnects, so a 1 s poll runs alongside the subscription.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use tg_kv::KvStore;

use crate::error::ApprovalError;
use crate::record::{ApprovalRecord, ApprovalStatus};

fn record_key(id: &str) -> String {
    format!("appr:{id}")
}

fn notify_channel(id: &str) -> String {
    format!("appr:notify:{id}")
}

/// Allocate a fresh 128-bit pending id (32 hex chars).
pub fn new_pending_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Default record TTL: 15 minutes.
pub const DEFAULT_TTL_SECS: u64 = 900;

/// Coordinates pending approvals over the KV store.
#[derive(Clone)]
pub struct ApprovalCoordinator {
    kv: Arc<dyn KvStore>,
}

impl ApprovalCoordinator {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Create a pending record with a TTL.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        id: &str,
        tenant: &str,
        requester: &str,
        tool: &str,
        args: serde_json::Value,
        required_approvals: u32,
        ttl: Duration,
        reason: &str,
    ) -> Result<ApprovalRecord, ApprovalError> {
        let record = ApprovalRecord {
            id: id.to_string(),
            created_ts: Utc::now().timestamp(),
            decided_ts: None,
            tenant: tenant.to_string(),
            requester: requester.to_string(),
            tool: tool.to_string(),
            args,
            status: ApprovalStatus::Pending,
            required_approvals: required_approvals.max(1),
            approvals: Vec::new(),
            rejections: Vec::new(),
            reason: reason.to_string(),
            rev: 0,
        };
        let key = record_key(id);
        self.kv.put_hash(&key, record.to_fields()).await?;
        self.kv.set_ttl(&key, ttl).await?;
        Ok(record)
    }

    /// Read a record; `None` when absent or expired.
    pub async fn get(&self, id: &str) -> Result<Option<ApprovalRecord>, ApprovalError> {
        match self.kv.get_hash(&record_key(id)).await? {
            Some(fields) => Ok(Some(ApprovalRecord::from_fields(id, &fields)?)),
            None => Ok(None),
        }
    }

    /// Record one approver's decision.
    ///
    /// Idempotent on terminal records: once the record is allow/deny, the
    /// stored record is returned unchanged no matter what is passed in.
    /// A still-pending record lets an approver change their mind — they
    /// are removed from both sets before the new decision is applied.
    pub async fn decide(
        &self,
        id: &str,
        approver: &str,
        decision: ApprovalStatus,
        reason: Option<&str>,
    ) -> Result<ApprovalRecord, ApprovalError> {
        debug_assert!(matches!(
            decision,
            ApprovalStatus::Allow | ApprovalStatus::Deny
        ));

        loop {
            let Some(current) = self.get(id).await? else {
                return Err(ApprovalError::PendingNotFound(id.to_string()));
            };
            if current.is_terminal() {
                return Ok(current);
            }

            let mut updated = current.clone();
            updated.approvals.retain(|a| a != approver);
            updated.rejections.retain(|a| a != approver);

            match decision {
                ApprovalStatus::Deny => {
                    updated.rejections.push(approver.to_string());
                    updated.status = ApprovalStatus::Deny;
                }
                ApprovalStatus::Allow | ApprovalStatus::Pending => {
                    updated.approvals.push(approver.to_string());
                    if updated.approvals.len() as u32 >= updated.required_approvals {
                        updated.status = ApprovalStatus::Allow;
                    }
                }
            }
            if let Some(r) = reason {
                if !r.is_empty() {
                    updated.reason = r.to_string();
                }
            }
            if updated.is_terminal() {
                updated.decided_ts = Some(Utc::now().timestamp());
            }
            updated.rev = current.rev + 1;

            let applied = self
                .kv
                .put_hash_if_rev(&record_key(id), current.rev, updated.to_fields())
                .await?;
            if !applied {
                // Lost the race; re-read and retry (or observe terminal).
                continue;
            }

            let message = json!({"id": id, "status": updated.status}).to_string();
            if let Err(e) = self.kv.publish(&notify_channel(id), &message).await {
                // Waiters fall back to polling, so a lost publish only
                // costs latency.
                tracing::warn!(pending_id = %id, error = %e, "approval notify publish failed");
            }
            return Ok(updated);
        }
    }

    /// Block until the record is terminal or the timeout elapses.
    ///
    /// Returns `None` on timeout or when the record is absent/expired.
    /// The subscription is dropped on every exit path.
    pub async fn wait(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<Option<ApprovalRecord>, ApprovalError> {
        match self.get(id).await? {
            Some(record) if record.is_terminal() => return Ok(Some(record)),
            Some(_) => {}
            None => return Ok(None),
        }

        let mut sub = self.kv.subscribe(&notify_channel(id)).await?;
        let mut sub_alive = true;
        let deadline = tokio::time::Instant::now() + timeout;
        let mut poll = tokio::time::interval(Duration::from_secs(1));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        poll.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
                _ = poll.tick() => {}
                msg = sub.recv(), if sub_alive => {
                    // A dead subscription degrades to pure polling.
                    if msg.is_none() {
                        sub_alive = false;
                    }
                }
            }
            match self.get(id).await? {
                Some(record) if record.is_terminal() => return Ok(Some(record)),
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }
}
