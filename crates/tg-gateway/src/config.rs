// config.rs — Gateway settings, read from the environment.
//
// Everything is optional except the KV and SQL locations (which have dev
// defaults). Missing crypto material downgrades the corresponding
// feature — unsigned builtin bundle, no chat callback, no signed URLs —
// but never weakens a verification path that is configured.

use std::path::PathBuf;
use std::time::Duration;

use tg_auth::TokenConfig;

/// Runtime configuration for the gateway.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP listen address.
    pub bind_addr: String,

    /// Builtin bundle file, served as the `__builtin__` version.
    pub policy_file: PathBuf,
    /// Directory registered bundle versions are copied into.
    pub policy_dir: PathBuf,
    /// Expected Ed25519 public key for the builtin bundle (base64).
    pub policy_public_key_b64: Option<String>,
    /// Signature envelope path for the builtin bundle.
    pub policy_sig_path: Option<PathBuf>,
    /// Fail startup when the builtin bundle's signature does not verify.
    pub require_signature: bool,

    /// How long `tools/call` blocks waiting for a synchronous approval.
    /// Zero disables waiting (the caller polls instead).
    pub approval_sync_wait: Duration,
    /// TTL on pending approval records.
    pub approval_ttl: Duration,

    /// Bearer token verification settings.
    pub token: TokenConfig,

    /// Secret for chat webhook callback signatures.
    pub chat_signing_secret: String,
    /// Chat webhook URL for approval notifications.
    pub chat_webhook_url: Option<String>,
    /// Secret for signed-URL approvals.
    pub url_signing_secret: String,

    /// KV store URL (redis).
    pub kv_url: String,
    /// SQLite database path.
    pub db_path: PathBuf,
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env(name).unwrap_or_else(|| default.to_string())
}

fn env_flag(name: &str) -> bool {
    matches!(
        env(name).as_deref().map(str::to_ascii_lowercase).as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

impl Settings {
    /// Read settings from `TOOLGATE_*` / `OIDC_*` / `DEV_*` variables.
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("TOOLGATE_BIND_ADDR", "0.0.0.0:8080"),
            policy_file: env_or("TOOLGATE_POLICY_FILE", "./policies/builtin.yaml").into(),
            policy_dir: env_or("TOOLGATE_POLICY_DIR", "./policies/versions").into(),
            policy_public_key_b64: env("TOOLGATE_POLICY_PUBLIC_KEY_B64"),
            policy_sig_path: env("TOOLGATE_POLICY_SIG_PATH").map(PathBuf::from),
            require_signature: env_flag("TOOLGATE_REQUIRE_SIGNATURE"),
            approval_sync_wait: Duration::from_millis(
                env_or("TOOLGATE_APPROVAL_SYNC_WAIT_MS", "0")
                    .parse()
                    .unwrap_or(0),
            ),
            approval_ttl: Duration::from_secs(
                env_or("TOOLGATE_APPROVAL_TTL_SEC", "900").parse().unwrap_or(900),
            ),
            token: TokenConfig {
                issuer: env("OIDC_ISSUER"),
                audience: env_or("OIDC_AUDIENCE", "toolgate"),
                jwks_url: env("OIDC_JWKS_URL"),
                dev_secret: env_or("DEV_JWT_SECRET", "change-me-dev-secret"),
                dev_issuer: env_or("DEV_ISSUER", "toolgate-dev"),
            },
            chat_signing_secret: env_or("TOOLGATE_CHAT_SIGNING_SECRET", ""),
            chat_webhook_url: env("TOOLGATE_CHAT_WEBHOOK_URL"),
            url_signing_secret: env_or("TOOLGATE_URL_SIGNING_SECRET", ""),
            kv_url: env_or("TOOLGATE_REDIS_URL", "redis://localhost:6379/0"),
            db_path: env_or("TOOLGATE_DB_PATH", "./toolgate.db").into(),
        }
    }

    /// Settings for tests: everything local, signatures off, secrets set.
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            policy_file: root.join("builtin.yaml"),
            policy_dir: root.join("versions"),
            policy_public_key_b64: None,
            policy_sig_path: None,
            require_signature: false,
            approval_sync_wait: Duration::ZERO,
            approval_ttl: Duration::from_secs(900),
            token: TokenConfig {
                issuer: None,
                audience: "toolgate".into(),
                jwks_url: None,
                dev_secret: "test-dev-secret".into(),
                dev_issuer: "toolgate-dev".into(),
            },
            chat_signing_secret: "test-chat-secret".into(),
            chat_webhook_url: None,
            url_signing_secret: "test-url-secret".into(),
            kv_url: String::new(),
            db_path: root.join("toolgate.db"),
        }
    }
}
