// rpc.rs — Transport-independent JSON-RPC 2.0 dispatch.
//
// Both transports (HTTP POST /mcp and line-oriented stdio) parse their
// own envelopes and then call `dispatch`. The method surface:
//
//   initialize  → capabilities + protocol version
//   tools/list  → registry listing
//   tools/call  → authenticate (transport) → resolve engine → evaluate
//                 → deny | approval | execute → audit → reply
//
// `shutdown` is a transport concern (stdio ends its loop); anything else
// is -32601. Policy deny and approval-pending are in-band tool replies
// with isError:true, not JSON-RPC errors.

use serde::Deserialize;
use serde_json::{json, Value};

use tg_audit::AuditEntry;
use tg_policy::{Decision, Outcome};
use tg_tools::{CallCtx, RegistryError};

use crate::error::codes;
use crate::state::Gateway;

/// MCP protocol revision advertised by `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// A parsed JSON-RPC request envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    pub fn is_shutdown(&self) -> bool {
        matches!(self.method.as_deref(), Some("shutdown") | Some("server/shutdown"))
    }
}

/// Who is making the call, as the dispatcher sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub tenant: String,
    pub subject: String,
}

impl CallerIdentity {
    /// Fixed identity for the unauthenticated stdio transport.
    pub fn stdio() -> Self {
        Self {
            tenant: "local".into(),
            subject: "stdio-client".into(),
        }
    }
}

pub fn rpc_result(id: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "result": result, "id": id})
}

pub fn rpc_error(id: &Value, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "error": {"code": code, "message": message}, "id": id})
}

/// An in-band tool reply (deny, pending, tool error, or success).
fn tool_text_reply(id: &Value, text: &str, is_error: bool) -> Value {
    rpc_result(
        id,
        json!({
            "content": [{"type": "text", "text": text}],
            "isError": is_error
        }),
    )
}

/// Dispatch one request. `shutdown` must be intercepted by the transport
/// before calling this.
pub async fn dispatch(gw: &Gateway, caller: &CallerIdentity, req: &RpcRequest) -> Value {
    if req.jsonrpc.as_deref() != Some("2.0") {
        return rpc_error(&req.id, codes::INVALID_REQUEST, "invalid request");
    }

    match req.method.as_deref() {
        Some("initialize") | Some("server/initialize") => rpc_result(
            &req.id,
            json!({
                "capabilities": {"tools": {"listChanged": true}},
                "protocolVersion": PROTOCOL_VERSION
            }),
        ),
        Some("tools/list") => rpc_result(
            &req.id,
            json!({"tools": gw.tools.list(), "nextCursor": null}),
        ),
        Some("tools/call") => tools_call(gw, caller, &req.id, &req.params).await,
        Some(other) => rpc_error(
            &req.id,
            codes::METHOD_NOT_FOUND,
            &format!("method not found: {other}"),
        ),
        None => rpc_error(&req.id, codes::INVALID_REQUEST, "invalid request"),
    }
}

async fn tools_call(gw: &Gateway, caller: &CallerIdentity, id: &Value, params: &Value) -> Value {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return rpc_error(id, codes::INVALID_REQUEST, "invalid request: params.name required");
    };
    let args = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    // Tenant-specific engine, falling back to the process-wide static
    // engine when resolution fails (e.g. the store is unreachable).
    let engine = match gw.resolver.engine_for(&caller.tenant) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::warn!(tenant = %caller.tenant, error = %e,
                "policy resolution failed, using static engine");
            gw.static_engine.clone()
        }
    };

    let decision = engine.evaluate(name, &args);
    match decision.outcome {
        Outcome::Deny => {
            let entry = AuditEntry::new(&caller.tenant, &caller.subject, name, "deny", &decision.rule)
                .with_args(args.clone())
                .with_result_meta(json!({"reason": decision.reason}));
            gw.audit.record(&entry);
            tool_text_reply(id, decision.reason.as_deref().unwrap_or("Blocked by policy"), true)
        }
        Outcome::Approval => approval_flow(gw, caller, id, name, &args, &decision).await,
        Outcome::Allow => execute_tool(
            gw,
            caller,
            id,
            name,
            &args,
            &decision.rule,
            json!({"source": "policy"}),
        ),
    }
}

/// Create the pending record, fire the notification, optionally wait.
async fn approval_flow(
    gw: &Gateway,
    caller: &CallerIdentity,
    id: &Value,
    name: &str,
    args: &Value,
    decision: &Decision,
) -> Value {
    let pending_id = tg_approvals::new_pending_id();
    let created = gw
        .approvals
        .create(
            &pending_id,
            &caller.tenant,
            &caller.subject,
            name,
            args.clone(),
            decision.required_approvals,
            gw.settings.approval_ttl,
            decision.reason.as_deref().unwrap_or_default(),
        )
        .await;
    if let Err(e) = created {
        tracing::error!(error = %e, "failed to create pending approval");
        return rpc_error(id, codes::INTERNAL_ERROR, "approval store unavailable");
    }

    let summary = tg_approvals::ChatNotifier::summarize(
        &format!("[{}] {} requested by {}", caller.tenant, name, caller.subject),
        decision.required_approvals,
    );
    gw.notifier.request_approval(&pending_id, &summary).await;

    if !gw.settings.approval_sync_wait.is_zero() {
        match gw.approvals.wait(&pending_id, gw.settings.approval_sync_wait).await {
            Ok(Some(record)) if record.status == tg_approvals::ApprovalStatus::Allow => {
                return execute_tool(
                    gw,
                    caller,
                    id,
                    name,
                    args,
                    &decision.rule,
                    json!({
                        "source": "sync_wait",
                        "approvals": record.approvals,
                        "rejections": record.rejections,
                    }),
                );
            }
            Ok(Some(record)) => {
                let entry =
                    AuditEntry::new(&caller.tenant, &caller.subject, name, "deny", &decision.rule)
                        .with_args(args.clone())
                        .with_result_meta(json!({
                            "source": "sync_wait",
                            "approvals": record.approvals,
                            "rejections": record.rejections,
                        }));
                gw.audit.record(&entry);
                return tool_text_reply(id, "Denied by approver", true);
            }
            Ok(None) => {} // timed out: fall through to the pending reply
            Err(e) => {
                tracing::warn!(pending_id = %pending_id, error = %e, "approval wait failed");
            }
        }
    }

    rpc_result(
        id,
        json!({
            "content": [{"type": "text", "text": format!("Approval required (pending_id={pending_id})")}],
            "pendingId": pending_id,
            "isError": true
        }),
    )
}

/// Run the handler and audit the terminal allow outcome.
fn execute_tool(
    gw: &Gateway,
    caller: &CallerIdentity,
    id: &Value,
    name: &str,
    args: &Value,
    rule: &str,
    mut meta: Value,
) -> Value {
    let ctx = CallCtx {
        tenant: caller.tenant.clone(),
        subject: caller.subject.clone(),
    };
    let outcome = match gw.tools.call(name, args, &ctx) {
        Err(RegistryError::UnknownTool(name)) => {
            return rpc_error(id, codes::INVALID_PARAMS, &format!("Unknown tool: {name}"));
        }
        Ok(outcome) => outcome,
    };

    if let Value::Object(map) = &mut meta {
        map.insert("executed".to_string(), Value::Bool(outcome.is_ok()));
        if let Err(e) = &outcome {
            map.insert("error".to_string(), Value::String(e.to_string()));
        }
    }
    let entry = AuditEntry::new(&caller.tenant, &caller.subject, name, "allow", rule)
        .with_args(args.clone())
        .with_result_meta(meta);
    gw.audit.record(&entry);

    match outcome {
        Ok(result) => rpc_result(
            id,
            json!({
                "content": [{"type": "text", "text": result.to_string()}],
                "structuredContent": result,
                "isError": false
            }),
        ),
        Err(e) => tool_text_reply(id, &format!("Tool error: {e}"), true),
    }
}
