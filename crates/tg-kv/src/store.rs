// store.rs — The KvStore trait and subscription handle.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::KvError;

/// Field name used by [`KvStore::put_hash_if_rev`] for optimistic
/// concurrency. Writers bump it on every successful CAS.
pub const REV_FIELD: &str = "rev";

/// A live pub/sub subscription. Messages arrive through a bounded
/// channel; dropping the handle ends the backing forwarder task.
pub struct Subscription {
    rx: mpsc::Receiver<String>,
}

impl Subscription {
    pub fn from_receiver(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Next message, or `None` once the publisher side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// The abstract key-value capability: hashes with TTL and CAS, plain
/// strings, and pub/sub.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Create or overwrite a hash with the given fields.
    async fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> Result<(), KvError>;

    /// Apply `fields` only if the hash exists and its `rev` field equals
    /// `expected_rev`. Returns `false` when the precondition failed —
    /// callers re-read and retry.
    async fn put_hash_if_rev(
        &self,
        key: &str,
        expected_rev: u64,
        fields: HashMap<String, String>,
    ) -> Result<bool, KvError>;

    /// Read a whole hash; `None` if absent or expired.
    async fn get_hash(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError>;

    /// (Re)arm the key's time-to-live.
    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError>;

    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Fire-and-forget broadcast; delivery is not guaranteed.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), KvError>;

    /// Subscribe to a channel. The subscription lives until dropped.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, KvError>;
}
