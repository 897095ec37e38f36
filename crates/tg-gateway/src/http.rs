// http.rs — HTTP surface: /mcp, approval callbacks, admin API, health.
//
// Error mapping: 401 for authentication, 403 for missing roles, 400 for
// validation, 404 for unknown ids/versions, 500 for infrastructure. The
// /mcp endpoint answers JSON-RPC envelopes even for auth failures
// (-32003 with HTTP 401) so RPC clients never have to parse two error
// vocabularies.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use tg_approvals::{ApprovalRecord, ApprovalStatus, CallbackError, DEFAULT_TOLERANCE_SECS};
use tg_audit::AuditEntry;
use tg_auth::{require_admin, require_viewer, AuthError, Claims};
use tg_kv::KvStore as _;
use tg_policy::{compare, Bundle, PolicyEngine};
use tg_rollout::RolloutError;

use crate::error::codes;
use crate::rpc::{dispatch, rpc_error, CallerIdentity, RpcRequest};
use crate::state::Gateway;

type AppState = Arc<Gateway>;

/// Build the gateway router.
pub fn build_router(gw: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/mcp", post(mcp_endpoint))
        .route("/callback/chat", post(chat_callback))
        .route("/callback/url", get(url_callback))
        .route("/v1/policy/apply", post(policy_apply))
        .route("/v1/policy/rollback", post(policy_rollback))
        .route("/v1/policy/status", get(policy_status))
        .route("/v1/policy/diff", post(policy_diff))
        .route("/v1/policy/simulate", post(policy_simulate))
        .route(
            "/admin/rbac/{tenant}/users/{subject}",
            put(rbac_put).get(rbac_get),
        )
        .route("/admin/tenants/{tenant}/quota", put(quota_put))
        .route("/admin/tenants/{tenant}/rate-limit", put(rate_limit_put))
        .layer(CorsLayer::permissive())
        .with_state(gw)
}

/// `{ "error": "<message>" }` with the given status.
fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn auth_header(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Verify the bearer token, mapping failures to HTTP 401.
async fn authenticate(gw: &Gateway, headers: &HeaderMap) -> Result<Claims, Response> {
    gw.tokens
        .verify(auth_header(headers))
        .await
        .map_err(|e| api_error(StatusCode::UNAUTHORIZED, e.to_string()))
}

fn guard(check: Result<(), AuthError>) -> Result<(), Response> {
    check.map_err(|e| api_error(StatusCode::FORBIDDEN, e.to_string()))
}

// ── Health ───────────────────────────────────────────────────────

async fn healthz() -> Json<Value> {
    Json(json!({"status": "healthy", "ts": chrono_now()}))
}

async fn readyz() -> Json<Value> {
    Json(json!({"status": "ready", "ts": chrono_now()}))
}

fn chrono_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// ── JSON-RPC over HTTP ───────────────────────────────────────────

async fn mcp_endpoint(State(gw): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let claims = match gw.tokens.verify(auth_header(&headers)).await {
        Ok(claims) => claims,
        Err(e) => {
            let envelope = rpc_error(&Value::Null, codes::AUTH_FAILED, &e.to_string());
            return (StatusCode::UNAUTHORIZED, Json(envelope)).into_response();
        }
    };

    let req: RpcRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(_) => {
            return Json(rpc_error(&Value::Null, codes::PARSE_ERROR, "parse error"))
                .into_response();
        }
    };

    let caller = CallerIdentity {
        tenant: claims.tenant,
        subject: claims.sub,
    };
    Json(dispatch(&gw, &caller, &req).await).into_response()
}

// ── Approval callbacks ───────────────────────────────────────────

fn audit_human_decision(
    gw: &Gateway,
    record: &ApprovalRecord,
    rule: &str,
    source: &str,
    approver: &str,
) {
    let entry = AuditEntry::new(
        &record.tenant,
        &record.requester,
        &record.tool,
        record.status.as_str(),
        rule,
    )
    .with_args(record.args.clone())
    .with_result_meta(json!({
        "source": source,
        "approvals": record.approvals,
        "rejections": record.rejections,
    }))
    .with_approver(approver);
    gw.audit.record(&entry);
}

fn callback_error_response(e: CallbackError) -> Response {
    match e {
        CallbackError::NotConfigured => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        CallbackError::BadTimestamp => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        CallbackError::StaleRequest | CallbackError::BadSignature => {
            api_error(StatusCode::UNAUTHORIZED, e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct ChatForm {
    payload: String,
}

/// Chat interactive-button callback: form-encoded `payload=<JSON>` signed
/// with the v0 timestamped HMAC scheme.
async fn chat_callback(State(gw): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let ts = headers
        .get("x-request-timestamp")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let signature = headers
        .get("x-request-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if let Err(e) = tg_approvals::verify_webhook(
        &gw.settings.chat_signing_secret,
        ts,
        signature,
        &body,
        DEFAULT_TOLERANCE_SECS,
    ) {
        return callback_error_response(e);
    }

    let Ok(form) = serde_urlencoded::from_bytes::<ChatForm>(&body) else {
        return api_error(StatusCode::BAD_REQUEST, "no payload");
    };
    let Ok(payload) = serde_json::from_str::<Value>(&form.payload) else {
        return api_error(StatusCode::BAD_REQUEST, "payload is not JSON");
    };

    let action = payload["actions"][0]["action_id"].as_str().unwrap_or("");
    let pending_id = payload["actions"][0]["value"].as_str().unwrap_or("");
    let approver = payload["user"]["username"]
        .as_str()
        .or_else(|| payload["user"]["id"].as_str())
        .unwrap_or("unknown");
    let decision = if action == "approve" {
        ApprovalStatus::Allow
    } else {
        ApprovalStatus::Deny
    };

    let text = match gw.approvals.decide(pending_id, approver, decision, None).await {
        Ok(record) => {
            audit_human_decision(&gw, &record, "human_approval", "chat", approver);
            chat_status_text(&record, action)
        }
        Err(tg_approvals::ApprovalError::PendingNotFound(_)) => {
            "Error: Approval not found or expired".to_string()
        }
        Err(e) => {
            tracing::error!(error = %e, "chat callback decide failed");
            return api_error(StatusCode::INTERNAL_SERVER_ERROR, "approval store unavailable");
        }
    };

    Json(json!({"response_action": "update", "text": text})).into_response()
}

/// Message shown in place of the chat buttons after a decision.
fn chat_status_text(record: &ApprovalRecord, action: &str) -> String {
    match record.status {
        ApprovalStatus::Pending => format!(
            "Decision recorded: {} ({}/{} approvals needed)",
            action.to_uppercase(),
            record.approvals.len(),
            record.required_approvals
        ),
        ApprovalStatus::Allow => "APPROVED - All required approvals received".to_string(),
        ApprovalStatus::Deny => "DENIED".to_string(),
    }
}

#[derive(Deserialize)]
struct UrlCallbackParams {
    pending_id: String,
    decision: String,
    ts: String,
    sig: String,
}

/// Signed-URL approval: the whole decision is in the query string.
async fn url_callback(
    State(gw): State<AppState>,
    Query(params): Query<UrlCallbackParams>,
) -> Response {
    if let Err(e) = tg_approvals::verify_signed_url(
        &gw.settings.url_signing_secret,
        &params.pending_id,
        &params.decision,
        &params.ts,
        &params.sig,
        DEFAULT_TOLERANCE_SECS,
    ) {
        return callback_error_response(e);
    }

    let decision = if params.decision == "approve" {
        ApprovalStatus::Allow
    } else {
        ApprovalStatus::Deny
    };

    match gw
        .approvals
        .decide(&params.pending_id, "ci-approver", decision, None)
        .await
    {
        Ok(record) => {
            audit_human_decision(&gw, &record, "url_approval", "url", "ci-approver");
            Json(json!({
                "status": "ok",
                "decision": params.decision,
                "pending_id": params.pending_id
            }))
            .into_response()
        }
        Err(tg_approvals::ApprovalError::PendingNotFound(_)) => {
            api_error(StatusCode::NOT_FOUND, "Approval not found or expired")
        }
        Err(e) => {
            tracing::error!(error = %e, "url callback decide failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "approval store unavailable")
        }
    }
}

// ── Policy management ────────────────────────────────────────────

#[derive(Deserialize)]
struct ApplyRequest {
    /// Bundle YAML text.
    payload_yaml: String,
    /// Signature envelope (JSON object).
    signature: Value,
    /// Expected Ed25519 public key, base64.
    pubkey_b64: String,
    #[serde(default = "default_strategy")]
    strategy: String,
    #[serde(default)]
    canary_percent: u32,
    #[serde(default = "default_seed")]
    seed: u64,
    #[serde(default)]
    tenants_csv: String,
}

fn default_strategy() -> String {
    "immediate_all".to_string()
}

fn default_seed() -> u64 {
    1
}

async fn policy_apply(
    State(gw): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ApplyRequest>,
) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_admin(&claims)) {
        return resp;
    }

    // Registration is path-based; stage the upload in temp files.
    let staged = (|| -> std::io::Result<(tempfile::NamedTempFile, tempfile::NamedTempFile)> {
        use std::io::Write as _;
        let mut payload = tempfile::NamedTempFile::new()?;
        payload.write_all(req.payload_yaml.as_bytes())?;
        let mut sig = tempfile::NamedTempFile::new()?;
        sig.write_all(req.signature.to_string().as_bytes())?;
        Ok((payload, sig))
    })();
    let (payload_file, sig_file) = match staged {
        Ok(files) => files,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    // Unlike startup, apply is always strict about signatures.
    let registered = match gw
        .versions
        .register(payload_file.path(), sig_file.path(), &req.pubkey_b64)
    {
        Ok(registered) => registered,
        Err(RolloutError::SignatureInvalid(e)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("policy signature invalid: {e}"),
                    "reason": e.reason(),
                })),
            )
                .into_response();
        }
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let rollout_result = match req.strategy.as_str() {
        "immediate_all" => gw.store.set_rollout_active(&registered.version, req.seed),
        "canary_percent" => gw.store.set_rollout_canary(
            &registered.version,
            &registered.version,
            req.canary_percent.min(100),
            req.seed,
        ),
        "explicit" => {
            let mut result = Ok(());
            for tenant in req.tenants_csv.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                result = gw.store.upsert_override(tenant, &registered.version);
                if result.is_err() {
                    break;
                }
            }
            result
        }
        other => {
            return api_error(StatusCode::BAD_REQUEST, format!("Unknown strategy: {other}"));
        }
    };
    if let Err(e) = rollout_result {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    Json(json!({
        "ok": true,
        "version": registered.version,
        "sha256": hex::encode(&registered.sha256),
        "strategy": req.strategy,
        "canary_percent": req.canary_percent,
        "seed": req.seed
    }))
    .into_response()
}

#[derive(Deserialize)]
struct RollbackParams {
    to_version: String,
}

async fn policy_rollback(
    State(gw): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RollbackParams>,
) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_admin(&claims)) {
        return resp;
    }

    // Preserve the current seed; rollback only moves the active pointer.
    let seed = gw.resolver.rollout().map(|r| r.seed).unwrap_or(1);
    if let Err(e) = gw.store.set_rollout_active(&params.to_version, seed) {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    Json(json!({"ok": true, "active_version": params.to_version})).into_response()
}

async fn policy_status(State(gw): State<AppState>, headers: HeaderMap) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_viewer(&claims)) {
        return resp;
    }

    let rollout = match gw.resolver.rollout() {
        Ok(rollout) => rollout,
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let overrides = gw.store.override_count().unwrap_or(0);
    Json(json!({
        "active_version": rollout.active_version,
        "canary_version": rollout.canary_version,
        "canary_percent": rollout.canary_percent,
        "seed": rollout.seed,
        "tenant_overrides": overrides
    }))
    .into_response()
}

#[derive(Deserialize)]
struct DiffRequest {
    /// Current bundle YAML; defaults to the server's active bundle.
    #[serde(default)]
    current_yaml: Option<String>,
    proposed_yaml: String,
}

async fn policy_diff(
    State(gw): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DiffRequest>,
) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_viewer(&claims)) {
        return resp;
    }

    let current = match req.current_yaml {
        Some(text) => match Bundle::from_yaml(&text) {
            Ok(bundle) => bundle,
            Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
        },
        // A diff against "the active bundle" must fail loudly if the
        // active bundle cannot be loaded — comparing against anything
        // else would silently misreport the change.
        None => match current_active_bundle(&gw) {
            Ok(bundle) => bundle,
            Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        },
    };
    let proposed = match Bundle::from_yaml(&req.proposed_yaml) {
        Ok(bundle) => bundle,
        Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    Json(serde_json::to_value(compare(&current, &proposed)).unwrap_or_default()).into_response()
}

/// The bundle currently served as the active version. Resolution goes
/// through the rollout resolver, so `__builtin__`, version-path lookup,
/// and parse failures all surface as errors rather than a fallback.
fn current_active_bundle(gw: &Gateway) -> Result<Bundle, RolloutError> {
    let rollout = gw.resolver.rollout()?;
    let engine = gw.resolver.engine_for_version(&rollout.active_version)?;
    Ok(engine.bundle().clone())
}

#[derive(Deserialize)]
struct SimulateRequest {
    tool: String,
    #[serde(default)]
    arguments: Value,
    /// Optional bundle file to simulate against instead of the static
    /// engine.
    #[serde(default)]
    policy_file: Option<String>,
}

async fn policy_simulate(
    State(gw): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SimulateRequest>,
) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_viewer(&claims)) {
        return resp;
    }

    let evaluation = match req.policy_file {
        Some(path) => match Bundle::from_file(&path) {
            Ok(bundle) => PolicyEngine::new(bundle).evaluate_with_trace(&req.tool, &req.arguments),
            Err(e) => return api_error(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => gw.static_engine.evaluate_with_trace(&req.tool, &req.arguments),
    };
    Json(serde_json::to_value(evaluation).unwrap_or_default()).into_response()
}

// ── RBAC and tenant settings ─────────────────────────────────────

#[derive(Deserialize)]
struct RolesBody {
    #[serde(default)]
    roles: Vec<String>,
}

async fn rbac_put(
    State(gw): State<AppState>,
    Path((tenant, subject)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<RolesBody>,
) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_admin(&claims)) {
        return resp;
    }

    match gw.roles.set_roles(&tenant, &subject, &body.roles).await {
        Ok(roles) => Json(json!({
            "ok": true, "tenant": tenant, "subject": subject, "roles": roles
        }))
        .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn rbac_get(
    State(gw): State<AppState>,
    Path((tenant, subject)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_admin(&claims)) {
        return resp;
    }

    match gw.roles.get_roles(&tenant, &subject).await {
        Ok(roles) => Json(json!({"tenant": tenant, "subject": subject, "roles": roles}))
            .into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn quota_put(
    State(gw): State<AppState>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    tenant_setting_put(gw, tenant, headers, body, "quota").await
}

async fn rate_limit_put(
    State(gw): State<AppState>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    tenant_setting_put(gw, tenant, headers, body, "ratelimit").await
}

/// Opaque per-tenant settings, stored as-is under `<kind>:<tenant>`.
async fn tenant_setting_put(
    gw: AppState,
    tenant: String,
    headers: HeaderMap,
    body: Value,
    kind: &str,
) -> Response {
    let claims = match authenticate(&gw, &headers).await {
        Ok(claims) => claims,
        Err(resp) => return resp,
    };
    if let Err(resp) = guard(require_admin(&claims)) {
        return resp;
    }

    let key = format!("{kind}:{tenant}");
    if let Err(e) = gw.kv.set(&key, &body.to_string()).await {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    Json(json!({"ok": true, "tenant": tenant, "settings": body})).into_response()
}
