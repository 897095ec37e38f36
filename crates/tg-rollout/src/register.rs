// register.rs — Verified registration of policy bundle versions.
//
// A bundle becomes a version only after signature verification succeeds.
// The version id is content-derived: UTC timestamp plus a short hex code
// taken from SHA-256(sha256(payload)), so identical payloads registered
// in the same second collide on the full id and the code is extended one
// nibble at a time until unique.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};

use tg_store::SqlStore;

use crate::error::RolloutError;

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub version: String,
    pub payload_path: PathBuf,
    pub sig_path: PathBuf,
    pub sha256: Vec<u8>,
}

/// Registers verified bundles into the versions directory + store.
pub struct VersionRegistry {
    store: Arc<SqlStore>,
    versions_dir: PathBuf,
}

impl VersionRegistry {
    pub fn new(store: Arc<SqlStore>, versions_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            versions_dir: versions_dir.into(),
        }
    }

    /// Verify and register a bundle. Fails hard on any signature problem.
    pub fn register(
        &self,
        payload_path: impl AsRef<Path>,
        sig_path: impl AsRef<Path>,
        public_key_b64: &str,
    ) -> Result<Registered, RolloutError> {
        tg_signing::verify_bundle(&payload_path, &sig_path, public_key_b64)?;

        let payload = std::fs::read(&payload_path)?;
        let sha = Sha256::digest(&payload).to_vec();
        let version = self.unique_version(&sha)?;

        std::fs::create_dir_all(&self.versions_dir)?;
        let dst_payload = self.versions_dir.join(format!("{version}.yaml"));
        let dst_sig = self.versions_dir.join(format!("{version}.yaml.sig"));
        std::fs::copy(&payload_path, &dst_payload)?;
        std::fs::copy(&sig_path, &dst_sig)?;

        self.store.insert_version(
            &version,
            &sha,
            &dst_payload.to_string_lossy(),
            &dst_sig.to_string_lossy(),
        )?;

        tracing::info!(version = %version, "registered policy bundle");
        Ok(Registered {
            version,
            payload_path: dst_payload,
            sig_path: dst_sig,
            sha256: sha,
        })
    }

    /// `YYYY-MM-DD_HHMMSS_<short>` where `<short>` starts at 4 hex chars
    /// of SHA-256(sha) and grows until the id is unused.
    fn unique_version(&self, sha: &[u8]) -> Result<String, RolloutError> {
        let ts = Utc::now().format("%Y-%m-%d_%H%M%S");
        let code = hex::encode(Sha256::digest(sha));
        let mut len = 4;
        loop {
            let candidate = format!("{ts}_{}", &code[..len]);
            if !self.store.version_exists(&candidate)? {
                return Ok(candidate);
            }
            if len >= code.len() {
                // 64 hex chars of the same digest in the same second:
                // the payload is already registered under this exact id.
                return Ok(candidate);
            }
            len += 1;
        }
    }
}
