// resolver.rs — tenant → engine resolution.
//
// Precedence: explicit tenant override, then canary (when the tenant's
// bucket falls under the percent), then the active version. The sentinel
// version `__builtin__` loads the configured bootstrap bundle file
// directly — it exists so a fresh install with an empty store can serve
// policy before the first `policy/apply`.

use std::path::PathBuf;
use std::sync::Arc;

use tg_policy::{Bundle, PolicyEngine};
use tg_store::{RolloutRow, SqlStore};

use crate::bucket::bucket;
use crate::cache::EngineCache;
use crate::error::RolloutError;

/// Sentinel active version meaning "serve the built-in bundle file".
pub const BUILTIN_VERSION: &str = "__builtin__";

/// Resolves tenants to compiled policy engines.
pub struct Resolver {
    store: Arc<SqlStore>,
    cache: EngineCache,
    /// Bootstrap bundle path served as `__builtin__`.
    builtin_path: PathBuf,
}

impl Resolver {
    pub fn new(store: Arc<SqlStore>, builtin_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            cache: EngineCache::new(),
            builtin_path: builtin_path.into(),
        }
    }

    /// Resolve the engine a tenant should be evaluated against.
    pub fn engine_for(&self, tenant: &str) -> Result<Arc<PolicyEngine>, RolloutError> {
        if let Some(version) = self.store.override_for(tenant)? {
            return self.engine_for_version(&version);
        }

        let rollout = self.rollout()?;
        if let Some(canary) = rollout.canary_version.as_deref() {
            if rollout.canary_percent > 0 && bucket(tenant, rollout.seed) < rollout.canary_percent {
                return self.engine_for_version(canary);
            }
        }
        self.engine_for_version(&rollout.active_version)
    }

    /// Engine for an explicit version (used by override + rollout paths).
    pub fn engine_for_version(&self, version: &str) -> Result<Arc<PolicyEngine>, RolloutError> {
        if version == BUILTIN_VERSION {
            // Not cached: the builtin file is mutable config, not an
            // immutable registered version.
            let bundle = Bundle::from_file(&self.builtin_path)?;
            return Ok(Arc::new(PolicyEngine::new(bundle)));
        }
        let path = self
            .store
            .version_path(version)?
            .ok_or_else(|| RolloutError::VersionNotFound(version.to_string()))?;
        self.cache.get_or_load(version, path)
    }

    /// Current rollout row, bootstrapping one if the table is empty:
    /// prefer the newest registered version, else `__builtin__`.
    pub fn rollout(&self) -> Result<RolloutRow, RolloutError> {
        if let Some(row) = self.store.rollout()? {
            return Ok(row);
        }
        if let Some(newest) = self.store.newest_version()? {
            self.store.init_rollout(&newest, 1)?;
            if let Some(row) = self.store.rollout()? {
                return Ok(row);
            }
        }
        Ok(RolloutRow {
            active_version: BUILTIN_VERSION.to_string(),
            canary_version: None,
            canary_percent: 0,
            seed: 1,
            updated_at: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_policy::Outcome;

    struct Fixture {
        resolver: Resolver,
        store: Arc<SqlStore>,
        _dir: tempfile::TempDir,
    }

    /// Write a registered version whose default decision identifies it.
    fn put_version(store: &SqlStore, dir: &std::path::Path, version: &str, decision: &str) {
        let path = dir.join(format!("{version}.yaml"));
        std::fs::write(&path, format!("defaults:\n  decision: {decision}\nrules: []\n")).unwrap();
        store
            .insert_version(version, &[0; 32], &path.to_string_lossy(), "unused.sig")
            .unwrap();
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let builtin = dir.path().join("builtin.yaml");
        std::fs::write(&builtin, "defaults:\n  decision: deny\nrules: []\n").unwrap();
        let store = Arc::new(SqlStore::open_in_memory().unwrap());
        Fixture {
            resolver: Resolver::new(store.clone(), &builtin),
            store,
            _dir: dir,
        }
    }

    fn default_of(engine: &PolicyEngine) -> Outcome {
        engine.bundle().defaults.decision
    }

    #[test]
    fn empty_store_serves_builtin() {
        let f = fixture();
        let engine = f.resolver.engine_for("anyone").unwrap();
        assert_eq!(default_of(&engine), Outcome::Deny);
    }

    #[test]
    fn bootstrap_promotes_newest_version() {
        let f = fixture();
        put_version(&f.store, f._dir.path(), "2026-08-01_100000_aaaa", "allow");
        let engine = f.resolver.engine_for("anyone").unwrap();
        assert_eq!(default_of(&engine), Outcome::Allow);
        // The rollout row was seeded.
        assert_eq!(
            f.store.rollout().unwrap().unwrap().active_version,
            "2026-08-01_100000_aaaa"
        );
    }

    #[test]
    fn override_beats_rollout() {
        let f = fixture();
        put_version(&f.store, f._dir.path(), "v-active", "deny");
        put_version(&f.store, f._dir.path(), "v-pinned", "allow");
        f.store.set_rollout_active("v-active", 1).unwrap();
        f.store.upsert_override("acme", "v-pinned").unwrap();

        assert_eq!(default_of(&f.resolver.engine_for("acme").unwrap()), Outcome::Allow);
        assert_eq!(default_of(&f.resolver.engine_for("other").unwrap()), Outcome::Deny);
    }

    #[test]
    fn canary_routes_by_bucket() {
        let f = fixture();
        put_version(&f.store, f._dir.path(), "v-active", "deny");
        put_version(&f.store, f._dir.path(), "v-canary", "allow");

        let seed = 1;
        let tenant = "tenant-A";
        let b = bucket(tenant, seed);

        // Percent just above the tenant's bucket: routed to canary.
        f.store
            .set_rollout_canary("v-active", "v-canary", b + 1, seed)
            .unwrap();
        assert_eq!(default_of(&f.resolver.engine_for(tenant).unwrap()), Outcome::Allow);

        // Percent equal to the bucket: bucket < percent fails, active.
        f.store
            .set_rollout_canary("v-active", "v-canary", b, seed)
            .unwrap();
        assert_eq!(default_of(&f.resolver.engine_for(tenant).unwrap()), Outcome::Deny);
    }

    #[test]
    fn canary_percent_zero_never_routes() {
        let f = fixture();
        put_version(&f.store, f._dir.path(), "v-active", "deny");
        put_version(&f.store, f._dir.path(), "v-canary", "allow");
        f.store
            .set_rollout_canary("v-active", "v-canary", 0, 1)
            .unwrap();

        for i in 0..50 {
            let engine = f.resolver.engine_for(&format!("tenant-{i}")).unwrap();
            assert_eq!(default_of(&engine), Outcome::Deny);
        }
    }

    #[test]
    fn canary_percent_hundred_always_routes() {
        let f = fixture();
        put_version(&f.store, f._dir.path(), "v-active", "deny");
        put_version(&f.store, f._dir.path(), "v-canary", "allow");
        f.store
            .set_rollout_canary("v-active", "v-canary", 100, 1)
            .unwrap();

        for i in 0..50 {
            let engine = f.resolver.engine_for(&format!("tenant-{i}")).unwrap();
            assert_eq!(default_of(&engine), Outcome::Allow);
        }
    }

    #[test]
    fn lowering_percent_only_flips_boundary_tenants() {
        // Tenants bucketed at exactly 24 leave the canary when percent
        // drops 25 → 24; everyone else stays put.
        let seed = 1;
        let tenants: Vec<String> = (0..200).map(|i| format!("tenant-{i}")).collect();
        let in_canary =
            |percent: u32, t: &str| bucket(t, seed) < percent;

        for t in &tenants {
            let before = in_canary(25, t);
            let after = in_canary(24, t);
            if bucket(t, seed) == 24 {
                assert!(before && !after);
            } else {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn unknown_override_version_is_an_error() {
        let f = fixture();
        f.store.upsert_override("acme", "ghost").unwrap();
        assert!(matches!(
            f.resolver.engine_for("acme"),
            Err(RolloutError::VersionNotFound(_))
        ));
    }
}
