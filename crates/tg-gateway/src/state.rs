// state.rs — Process-lifetime gateway context.
//
// One Gateway per process: it owns the SQL store, the KV-backed
// coordinator, the rollout resolver with its engine cache, the token
// verifier with its JWKS slot, and the audit writer. Handlers get an
// Arc<Gateway> rather than reaching for globals, so tests spin up fully
// isolated instances.

use std::sync::Arc;

use tg_approvals::{ApprovalCoordinator, ChatNotifier};
use tg_audit::AuditWriter;
use tg_auth::{RoleStore, TokenVerifier};
use tg_kv::KvStore;
use tg_policy::{Bundle, PolicyEngine};
use tg_rollout::{Resolver, VersionRegistry};
use tg_store::SqlStore;
use tg_tools::ToolRegistry;

use crate::config::Settings;
use crate::error::GatewayError;

/// Shared state behind every transport and endpoint.
pub struct Gateway {
    pub settings: Settings,
    pub store: Arc<SqlStore>,
    pub kv: Arc<dyn KvStore>,
    pub tools: ToolRegistry,
    pub resolver: Resolver,
    /// Fallback engine used when tenant resolution fails.
    pub static_engine: Arc<PolicyEngine>,
    pub versions: VersionRegistry,
    pub approvals: ApprovalCoordinator,
    pub notifier: ChatNotifier,
    pub tokens: TokenVerifier,
    pub roles: RoleStore,
    pub audit: AuditWriter,
}

impl Gateway {
    /// Assemble a gateway from its storage backends.
    pub fn new(
        settings: Settings,
        kv: Arc<dyn KvStore>,
        store: Arc<SqlStore>,
    ) -> Result<Self, GatewayError> {
        let static_engine = load_static_engine(&settings)?;
        let resolver = Resolver::new(store.clone(), &settings.policy_file);
        let versions = VersionRegistry::new(store.clone(), &settings.policy_dir);
        let audit = AuditWriter::open(store.clone())?;

        Ok(Self {
            tools: ToolRegistry::builtin(),
            resolver,
            static_engine,
            versions,
            approvals: ApprovalCoordinator::new(kv.clone()),
            notifier: ChatNotifier::new(settings.chat_webhook_url.clone()),
            tokens: TokenVerifier::new(settings.token.clone()),
            roles: RoleStore::new(kv.clone()),
            audit,
            kv,
            store,
            settings,
        })
    }
}

/// Load the builtin bundle as the process-wide static engine.
///
/// When signing material is configured the bundle is verified first; a
/// bad signature is fatal only under `require_signature` — otherwise the
/// bundle still loads with a warning. (`policy/apply` has no such
/// leniency; this asymmetry exists so a fresh install can boot before
/// its first signed apply.)
fn load_static_engine(settings: &Settings) -> Result<Arc<PolicyEngine>, GatewayError> {
    if let (Some(key), Some(sig_path)) =
        (&settings.policy_public_key_b64, &settings.policy_sig_path)
    {
        match tg_signing::verify_bundle(&settings.policy_file, sig_path, key) {
            Ok(()) => tracing::info!("builtin policy signature verified"),
            Err(e) if settings.require_signature => {
                return Err(GatewayError::PolicySignatureInvalid(e));
            }
            Err(e) => {
                tracing::warn!(error = %e, "builtin policy signature invalid, loading anyway");
            }
        }
    }

    let bundle = Bundle::from_file(&settings.policy_file)?;
    Ok(Arc::new(PolicyEngine::new(bundle)))
}
