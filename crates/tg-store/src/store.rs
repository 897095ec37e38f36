// store.rs — SQLite store for versions, rollout, overrides, and audit.
//
// Schema matches the persisted state layout:
//   policy_version(version PK, sha256, path, sig_path, created_at)
//   policy_rollout(id=1, active_version, canary_version?, canary_percent, seed, updated_at)
//   tenant_policy_override(tenant PK, version, updated_at)
//   audit_log(ts, tenant, subject, tool, decision, rule, args, result_meta, approver?, hash, prev_hash?)
//
// Versions are immutable once inserted; the rollout row is a singleton.

use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension as _};

use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS policy_version (
    version     TEXT PRIMARY KEY,
    sha256      BLOB NOT NULL,
    path        TEXT NOT NULL,
    sig_path    TEXT NOT NULL,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS policy_rollout (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    active_version  TEXT NOT NULL,
    canary_version  TEXT,
    canary_percent  INTEGER NOT NULL DEFAULT 0,
    seed            INTEGER NOT NULL DEFAULT 1,
    updated_at      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tenant_policy_override (
    tenant      TEXT PRIMARY KEY,
    version     TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS audit_log (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    ts           TEXT NOT NULL,
    tenant       TEXT NOT NULL,
    subject      TEXT NOT NULL,
    tool         TEXT NOT NULL,
    decision     TEXT NOT NULL,
    rule         TEXT NOT NULL,
    args         TEXT NOT NULL,
    result_meta  TEXT NOT NULL,
    approver     TEXT,
    hash         BLOB NOT NULL,
    prev_hash    BLOB
);
"#;

/// A registered policy version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRow {
    pub version: String,
    pub sha256: Vec<u8>,
    pub path: String,
    pub sig_path: String,
    pub created_at: String,
}

/// The singleton rollout row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutRow {
    pub active_version: String,
    pub canary_version: Option<String>,
    pub canary_percent: u32,
    pub seed: u64,
    pub updated_at: String,
}

/// One audit entry as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub ts: String,
    pub tenant: String,
    pub subject: String,
    pub tool: String,
    pub decision: String,
    pub rule: String,
    pub args: String,
    pub result_meta: String,
    pub approver: Option<String>,
    pub hash: Vec<u8>,
    pub prev_hash: Option<Vec<u8>>,
}

/// SQLite store, serialized behind a mutex.
pub struct SqlStore {
    conn: Mutex<Connection>,
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqlStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory store, used by tests and `--ephemeral` runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    // ── policy_version ───────────────────────────────────────────

    pub fn insert_version(
        &self,
        version: &str,
        sha256: &[u8],
        path: &str,
        sig_path: &str,
    ) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO policy_version(version, sha256, path, sig_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![version, sha256, path, sig_path, now_ts()],
        )?;
        Ok(())
    }

    pub fn version_exists(&self, version: &str) -> Result<bool, StoreError> {
        let exists: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM policy_version WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .optional()?;
        Ok(exists.is_some())
    }

    /// Payload path for a registered version.
    pub fn version_path(&self, version: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT path FROM policy_version WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Most recently registered version, if any (bootstrap path).
    pub fn newest_version(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT version FROM policy_version ORDER BY created_at DESC, version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    // ── policy_rollout ───────────────────────────────────────────

    pub fn rollout(&self) -> Result<Option<RolloutRow>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT active_version, canary_version, canary_percent, seed, updated_at
                 FROM policy_rollout WHERE id = 1",
                [],
                |row| {
                    Ok(RolloutRow {
                        active_version: row.get(0)?,
                        canary_version: row.get(1)?,
                        canary_percent: row.get::<_, i64>(2)? as u32,
                        seed: row.get::<_, i64>(3)? as u64,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?)
    }

    /// Immediate rollout: everyone moves to `version`, canary cleared.
    pub fn set_rollout_active(&self, version: &str, seed: u64) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO policy_rollout(id, active_version, canary_version, canary_percent, seed, updated_at)
             VALUES (1, ?1, NULL, 0, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                 active_version = excluded.active_version,
                 canary_version = NULL,
                 canary_percent = 0,
                 seed = excluded.seed,
                 updated_at = excluded.updated_at",
            params![version, seed as i64, now_ts()],
        )?;
        Ok(())
    }

    /// Canary rollout: keep (or seed) the active version, point the canary
    /// at `canary_version` for `percent` of tenants.
    pub fn set_rollout_canary(
        &self,
        fallback_active: &str,
        canary_version: &str,
        percent: u32,
        seed: u64,
    ) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO policy_rollout(id, active_version, canary_version, canary_percent, seed, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 canary_version = excluded.canary_version,
                 canary_percent = excluded.canary_percent,
                 seed = excluded.seed,
                 updated_at = excluded.updated_at",
            params![fallback_active, canary_version, percent as i64, seed as i64, now_ts()],
        )?;
        Ok(())
    }

    /// Seed the rollout row only when missing (bootstrap).
    pub fn init_rollout(&self, active_version: &str, seed: u64) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT OR IGNORE INTO policy_rollout(id, active_version, canary_version, canary_percent, seed, updated_at)
             VALUES (1, ?1, NULL, 0, ?2, ?3)",
            params![active_version, seed as i64, now_ts()],
        )?;
        Ok(())
    }

    // ── tenant_policy_override ───────────────────────────────────

    pub fn upsert_override(&self, tenant: &str, version: &str) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO tenant_policy_override(tenant, version, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(tenant) DO UPDATE SET
                 version = excluded.version,
                 updated_at = excluded.updated_at",
            params![tenant, version, now_ts()],
        )?;
        Ok(())
    }

    pub fn override_for(&self, tenant: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT version FROM tenant_policy_override WHERE tenant = ?1",
                params![tenant],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn override_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM tenant_policy_override",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ── audit_log ────────────────────────────────────────────────

    pub fn append_audit(&self, row: &AuditRow) -> Result<(), StoreError> {
        self.conn().execute(
            "INSERT INTO audit_log(ts, tenant, subject, tool, decision, rule, args, result_meta, approver, hash, prev_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.ts,
                row.tenant,
                row.subject,
                row.tool,
                row.decision,
                row.rule,
                row.args,
                row.result_meta,
                row.approver,
                row.hash,
                row.prev_hash,
            ],
        )?;
        Ok(())
    }

    /// Hash of the most recent audit entry — the chain head.
    pub fn last_audit_hash(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT hash FROM audit_log ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Recent audit rows, newest first (admin/debug surface).
    pub fn recent_audit(&self, limit: u32) -> Result<Vec<AuditRow>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT ts, tenant, subject, tool, decision, rule, args, result_meta, approver, hash, prev_hash
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(AuditRow {
                    ts: row.get(0)?,
                    tenant: row.get(1)?,
                    subject: row.get(2)?,
                    tool: row.get(3)?,
                    decision: row.get(4)?,
                    rule: row.get(5)?,
                    args: row.get(6)?,
                    result_meta: row.get(7)?,
                    approver: row.get(8)?,
                    hash: row.get(9)?,
                    prev_hash: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqlStore {
        SqlStore::open_in_memory().unwrap()
    }

    #[test]
    fn version_insert_and_lookup() {
        let s = store();
        s.insert_version("2026-08-01_120000_abcd", &[1; 32], "/v/a.yaml", "/v/a.yaml.sig")
            .unwrap();
        assert!(s.version_exists("2026-08-01_120000_abcd").unwrap());
        assert_eq!(
            s.version_path("2026-08-01_120000_abcd").unwrap().as_deref(),
            Some("/v/a.yaml")
        );
        assert_eq!(s.version_path("missing").unwrap(), None);
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let s = store();
        s.insert_version("v1", &[1; 32], "a", "a.sig").unwrap();
        assert!(s.insert_version("v1", &[1; 32], "a", "a.sig").is_err());
    }

    #[test]
    fn rollout_starts_absent_then_upserts() {
        let s = store();
        assert!(s.rollout().unwrap().is_none());

        s.set_rollout_active("v1", 1).unwrap();
        let ro = s.rollout().unwrap().unwrap();
        assert_eq!(ro.active_version, "v1");
        assert_eq!(ro.canary_version, None);
        assert_eq!(ro.canary_percent, 0);

        s.set_rollout_canary("ignored", "v2", 25, 7).unwrap();
        let ro = s.rollout().unwrap().unwrap();
        // Active is preserved on conflict; only canary fields move.
        assert_eq!(ro.active_version, "v1");
        assert_eq!(ro.canary_version.as_deref(), Some("v2"));
        assert_eq!(ro.canary_percent, 25);
        assert_eq!(ro.seed, 7);
    }

    #[test]
    fn canary_seeds_active_when_row_missing() {
        let s = store();
        s.set_rollout_canary("v0", "v1", 10, 1).unwrap();
        let ro = s.rollout().unwrap().unwrap();
        assert_eq!(ro.active_version, "v0");
        assert_eq!(ro.canary_version.as_deref(), Some("v1"));
    }

    #[test]
    fn rollback_clears_canary() {
        let s = store();
        s.set_rollout_canary("v1", "v2", 50, 1).unwrap();
        s.set_rollout_active("v1", 1).unwrap();
        let ro = s.rollout().unwrap().unwrap();
        assert_eq!(ro.active_version, "v1");
        assert_eq!(ro.canary_version, None);
        assert_eq!(ro.canary_percent, 0);
    }

    #[test]
    fn init_rollout_does_not_clobber() {
        let s = store();
        s.set_rollout_active("v1", 1).unwrap();
        s.init_rollout("v9", 9).unwrap();
        assert_eq!(s.rollout().unwrap().unwrap().active_version, "v1");
    }

    #[test]
    fn overrides_upsert_and_count() {
        let s = store();
        s.upsert_override("acme", "v1").unwrap();
        s.upsert_override("acme", "v2").unwrap();
        s.upsert_override("globex", "v1").unwrap();
        assert_eq!(s.override_for("acme").unwrap().as_deref(), Some("v2"));
        assert_eq!(s.override_for("unknown").unwrap(), None);
        assert_eq!(s.override_count().unwrap(), 2);
    }

    #[test]
    fn newest_version_prefers_latest() {
        let s = store();
        assert_eq!(s.newest_version().unwrap(), None);
        s.insert_version("2026-08-01_100000_aaaa", &[0; 32], "a", "a.sig")
            .unwrap();
        s.insert_version("2026-08-01_110000_bbbb", &[0; 32], "b", "b.sig")
            .unwrap();
        assert_eq!(
            s.newest_version().unwrap().as_deref(),
            Some("2026-08-01_110000_bbbb")
        );
    }

    #[test]
    fn audit_append_and_chain_head() {
        let s = store();
        assert_eq!(s.last_audit_hash().unwrap(), None);

        s.append_audit(&AuditRow {
            ts: "2026-08-01T00:00:00Z".into(),
            tenant: "acme".into(),
            subject: "alice".into(),
            tool: "fs.write".into(),
            decision: "deny".into(),
            rule: "r".into(),
            args: "{}".into(),
            result_meta: "{}".into(),
            approver: None,
            hash: vec![1, 2, 3],
            prev_hash: None,
        })
        .unwrap();

        assert_eq!(s.last_audit_hash().unwrap(), Some(vec![1, 2, 3]));
        let rows = s.recent_audit(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tenant, "acme");
    }
}
