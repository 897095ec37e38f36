//! # tg-rollout
//!
//! Policy lifecycle: verified registration of new bundle versions,
//! content-derived version ids, and the tenant → engine resolution that
//! drives staged rollouts (explicit overrides, canary percentages with
//! deterministic bucketing, and the active version).

pub mod bucket;
pub mod cache;
pub mod error;
pub mod register;
pub mod resolver;

pub use bucket::bucket;
pub use cache::EngineCache;
pub use error::RolloutError;
pub use register::{Registered, VersionRegistry};
pub use resolver::{Resolver, BUILTIN_VERSION};
