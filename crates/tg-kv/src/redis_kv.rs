// redis_kv.rs — Redis-backed KvStore.
//
// Commands run over a shared ConnectionManager (auto-reconnecting
// multiplexed connection). Subscriptions need a dedicated connection, so
// each subscribe opens its own pub/sub connection and forwards messages
// until the Subscription handle is dropped.
//
// The rev-guarded CAS is a small Lua script: HGET rev, compare, HSET the
// new fields atomically. Redis runs scripts single-threaded, so the
// check-then-write cannot interleave with another writer.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt as _;
use redis::aio::ConnectionManager;
use redis::AsyncCommands as _;
use tokio::sync::mpsc;

use crate::error::KvError;
use crate::store::{KvStore, Subscription};

const CAS_SCRIPT: &str = r#"
local rev = redis.call('HGET', KEYS[1], 'rev')
if rev == ARGV[1] then
  for i = 2, #ARGV, 2 do
    redis.call('HSET', KEYS[1], ARGV[i], ARGV[i + 1])
  end
  return 1
end
return 0
"#;

/// Redis implementation of [`KvStore`].
pub struct RedisKv {
    manager: ConnectionManager,
    client: redis::Client,
    cas: redis::Script,
}

impl RedisKv {
    /// Connect to redis at `url` (e.g. `redis://localhost:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client =
            redis::Client::open(url).map_err(|e| KvError::Connection(e.to_string()))?;
        let manager = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| KvError::Connection(e.to_string()))?;
        Ok(Self {
            manager,
            client,
            cas: redis::Script::new(CAS_SCRIPT),
        })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn put_hash(&self, key: &str, fields: HashMap<String, String>) -> Result<(), KvError> {
        let pairs: Vec<(String, String)> = fields.into_iter().collect();
        let mut conn = self.manager.clone();
        conn.hset_multiple::<_, _, _, ()>(key, &pairs).await?;
        Ok(())
    }

    async fn put_hash_if_rev(
        &self,
        key: &str,
        expected_rev: u64,
        fields: HashMap<String, String>,
    ) -> Result<bool, KvError> {
        let mut invocation = self.cas.key(key);
        invocation.arg(expected_rev.to_string());
        for (field, value) in fields {
            invocation.arg(field).arg(value);
        }
        let mut conn = self.manager.clone();
        let applied: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(applied == 1)
    }

    async fn get_hash(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        let mut conn = self.manager.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        // HGETALL on a missing key returns an empty map.
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        conn.expire::<_, ()>(key, ttl.as_secs() as i64).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<(), KvError> {
        let mut conn = self.manager.clone();
        conn.publish::<_, _, ()>(channel, message).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription, KvError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| KvError::Connection(e.to_string()))?;
        pubsub.subscribe(channel).await?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = stream.next() => {
                        let Some(msg) = msg else { break };
                        let payload: String = match msg.get_payload() {
                            Ok(p) => p,
                            Err(_) => continue,
                        };
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                }
            }
            // Dropping the stream closes the pub/sub connection, which
            // unsubscribes server-side.
        });
        Ok(Subscription::from_receiver(rx))
    }
}
