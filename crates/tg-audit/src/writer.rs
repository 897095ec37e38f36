// writer.rs — Hash-chained audit writer over the SQL store.
//
// The writer holds the chain head under a mutex: compute_hash + persist
// happen under the lock so concurrent appenders serialize and the chain
// never forks. On the tool-call reply path appends are best-effort —
// a failed audit write is logged loudly but never turns into a user-facing
// error (legitimate traffic must not be denied because the audit store is
// down; operators alert on the log line instead).

use std::sync::{Arc, Mutex};

use serde_json::Value;
use sha2::{Digest, Sha256};

use tg_store::{AuditRow, SqlStore};

use crate::canonical::canonical_json;
use crate::entry::AuditEntry;
use crate::error::AuditError;

/// `SHA-256(prev_hash_bytes || canonical_json(entry))`.
pub fn compute_hash(entry: &Value, prev_hash: Option<&[u8]>) -> Vec<u8> {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev);
    }
    hasher.update(canonical_json(entry).as_bytes());
    hasher.finalize().to_vec()
}

/// Appends entries to the audit_log table, maintaining the hash chain.
pub struct AuditWriter {
    store: Arc<SqlStore>,
    last_hash: Mutex<Option<Vec<u8>>>,
}

impl AuditWriter {
    /// Create a writer, recovering the chain head from existing rows.
    pub fn open(store: Arc<SqlStore>) -> Result<Self, AuditError> {
        let last_hash = store.last_audit_hash()?;
        Ok(Self {
            store,
            last_hash: Mutex::new(last_hash),
        })
    }

    /// Append an entry and return its hash.
    pub fn append(&self, entry: &AuditEntry) -> Result<Vec<u8>, AuditError> {
        let value = serde_json::to_value(entry)?;

        let mut head = self.last_hash.lock().expect("audit mutex poisoned");
        let hash = compute_hash(&value, head.as_deref());
        self.store.append_audit(&AuditRow {
            ts: entry.ts.clone(),
            tenant: entry.tenant.clone(),
            subject: entry.subject.clone(),
            tool: entry.tool.clone(),
            decision: entry.decision.clone(),
            rule: entry.rule.clone(),
            args: serde_json::to_string(&entry.args)?,
            result_meta: serde_json::to_string(&entry.result_meta)?,
            approver: entry.approver.clone(),
            hash: hash.clone(),
            prev_hash: head.clone(),
        })?;
        *head = Some(hash.clone());
        Ok(hash)
    }

    /// Best-effort append for the reply path.
    pub fn record(&self, entry: &AuditEntry) {
        if let Err(e) = self.append(entry) {
            tracing::warn!(error = %e, tool = %entry.tool, tenant = %entry.tenant,
                "failed to persist audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn writer() -> (AuditWriter, Arc<SqlStore>) {
        let store = Arc::new(SqlStore::open_in_memory().unwrap());
        (AuditWriter::open(store.clone()).unwrap(), store)
    }

    #[test]
    fn first_entry_hashes_without_prev() {
        let value = json!({"a": 1});
        let expected = Sha256::digest(canonical_json(&value).as_bytes()).to_vec();
        assert_eq!(compute_hash(&value, None), expected);
    }

    #[test]
    fn prev_hash_is_prefixed() {
        let value = json!({"a": 1});
        let prev = vec![9u8; 32];
        let mut hasher = Sha256::new();
        hasher.update(&prev);
        hasher.update(canonical_json(&value).as_bytes());
        assert_eq!(compute_hash(&value, Some(&prev)), hasher.finalize().to_vec());
    }

    #[test]
    fn appends_chain_through_the_store() {
        let (w, store) = writer();
        let h1 = w
            .append(&AuditEntry::new("t", "s", "tool", "deny", "r1"))
            .unwrap();
        let h2 = w
            .append(&AuditEntry::new("t", "s", "tool", "allow", "r2"))
            .unwrap();
        assert_ne!(h1, h2);
        assert_eq!(store.last_audit_hash().unwrap(), Some(h2.clone()));

        let rows = store.recent_audit(10).unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first: rows[0] is the second entry.
        assert_eq!(rows[0].prev_hash, Some(h1));
        assert_eq!(rows[1].prev_hash, None);
    }

    #[test]
    fn reopened_writer_continues_the_chain() {
        let store = Arc::new(SqlStore::open_in_memory().unwrap());
        let h1 = {
            let w = AuditWriter::open(store.clone()).unwrap();
            w.append(&AuditEntry::new("t", "s", "tool", "deny", "r"))
                .unwrap()
        };
        let w = AuditWriter::open(store.clone()).unwrap();
        w.append(&AuditEntry::new("t", "s", "tool", "allow", "r"))
            .unwrap();
        let rows = store.recent_audit(10).unwrap();
        assert_eq!(rows[0].prev_hash, Some(h1));
    }

    #[test]
    fn record_swallows_errors() {
        // record() must never panic; with a healthy store it just appends.
        let (w, store) = writer();
        w.record(&AuditEntry::new("t", "s", "tool", "deny", "r"));
        assert_eq!(store.recent_audit(10).unwrap().len(), 1);
    }
}
