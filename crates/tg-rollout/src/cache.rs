// cache.rs — Process-local cache of compiled engines.
//
// Engines are pure functions of immutable bundle files, so entries never
// invalidate and the cache is unbounded (bundles are small). Inserts are
// idempotent; a racing double-compile just wastes one parse.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tg_policy::{Bundle, PolicyEngine};

use crate::error::RolloutError;

/// version → compiled engine.
#[derive(Default)]
pub struct EngineCache {
    engines: Mutex<HashMap<String, Arc<PolicyEngine>>>,
}

impl EngineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the engine for a version, lazily compiling from `path`.
    pub fn get_or_load(
        &self,
        version: &str,
        path: impl AsRef<Path>,
    ) -> Result<Arc<PolicyEngine>, RolloutError> {
        if let Some(engine) = self
            .engines
            .lock()
            .expect("engine cache mutex poisoned")
            .get(version)
        {
            return Ok(engine.clone());
        }

        let engine = Arc::new(PolicyEngine::new(Bundle::from_file(path)?));
        self.engines
            .lock()
            .expect("engine cache mutex poisoned")
            .insert(version.to_string(), engine.clone());
        Ok(engine)
    }

    pub fn len(&self) -> usize {
        self.engines.lock().expect("engine cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
