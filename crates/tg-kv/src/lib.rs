//! # tg-kv
//!
//! The key-value capability toolgate builds approvals and RBAC on:
//! hashes with TTL, plain strings, publish/subscribe, and a rev-guarded
//! compare-and-set for optimistic concurrency.
//!
//! Two implementations: [`RedisKv`] for deployments (redis hashes,
//! EXPIRE, pub/sub channels, a Lua script for the CAS) and [`MemoryKv`]
//! for tests and single-process development. Subscriptions are plain
//! bounded channels; dropping a [`Subscription`] tears down its
//! forwarding task, so waiters cannot leak server-side subscriptions.

pub mod error;
pub mod memory;
pub mod redis_kv;
pub mod store;

pub use error::KvError;
pub use memory::MemoryKv;
pub use redis_kv::RedisKv;
pub use store::{KvStore, Subscription};
