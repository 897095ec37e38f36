// memory.rs — In-process KvStore for tests and single-node development.
//
// Hash TTLs are enforced lazily: an expired entry is dropped on the next
// read, which is exactly the visibility the coordinator needs (get after
// expiry returns None). Pub/sub rides on tokio broadcast channels with a
// forwarder task per subscription.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::KvError;
use crate::store::{KvStore, Subscription, REV_FIELD};

struct HashEntry {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl HashEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() >= t)
    }
}

/// In-memory KvStore.
#[derive(Default)]
pub struct MemoryKv {
    hashes: Mutex<HashMap<String, HashEntry>>,
    strings: Mutex<HashMap<String, String>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().expect("channel mutex poisoned");
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    /// Live (unexpired) hash keys with the given prefix. Inspection
    /// helper for tests and dev tooling; not part of [`KvStore`].
    pub fn hash_keys(&self, prefix: &str) -> Vec<String> {
        let hashes = self.hashes.lock().expect("hash mutex poisoned");
        hashes
            .iter()
            .filter(|(k, entry)| k.starts_with(prefix) && !entry.expired())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> Result<(), KvError> {
        let mut hashes = self.hashes.lock().expect("hash mutex poisoned");
        hashes.insert(
            key.to_string(),
            HashEntry {
                fields,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn put_hash_if_rev(
        &self,
        key: &str,
        expected_rev: u64,
        fields: HashMap<String, String>,
    ) -> Result<bool, KvError> {
        let mut hashes = self.hashes.lock().expect("hash mutex poisoned");
        let Some(entry) = hashes.get_mut(key) else {
            return Ok(false);
        };
        if entry.expired() {
            hashes.remove(key);
            return Ok(false);
        }
        let current: u64 = entry
            .fields
            .get(REV_FIELD)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if current != expected_rev {
            return Ok(false);
        }
        entry.fields.extend(fields);
        Ok(true)
    }

    async fn get_hash(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        let mut hashes = self.hashes.lock().expect("hash mutex poisoned");
        match hashes.get(key) {
            Some(entry) if entry.expired() => {
                hashes.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.fields.clone())),
            None => Ok(None),
        }
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut hashes = self.hashes.lock().expect("hash mutex poisoned");
        if let Some(entry) = hashes.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self
            .strings
            .lock()
            .expect("string mutex poisoned")
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.strings
            .lock()
            .expect("string mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), KvError> {
        // No subscribers is fine; pub/sub is best-effort by contract.
        let _ = self.sender_for(channel).send(message.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, KvError> {
        let mut brx = self.sender_for(channel).subscribe();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = brx.recv() => match msg {
                        Ok(m) => {
                            if tx.send(m).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
        Ok(Subscription::from_receiver(rx))
    }
}
