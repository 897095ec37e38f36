// entry.rs — Audit entry data model.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One audit record: who asked for what, what the gateway decided, and
/// under which rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// When the decision was recorded (UTC, RFC 3339).
    pub ts: String,
    pub tenant: String,
    pub subject: String,
    pub tool: String,
    /// Tool arguments as supplied by the caller.
    pub args: Value,
    /// Terminal decision: allow / deny / pending-resolution outcomes.
    pub decision: String,
    /// Rule name that produced the decision (or a synthetic source such
    /// as `human_approval`).
    pub rule: String,
    /// Execution metadata: handler result summary, approval sets, source.
    #[serde(default)]
    pub result_meta: Value,
    /// Set when a human decision produced this entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
}

impl AuditEntry {
    pub fn new(
        tenant: impl Into<String>,
        subject: impl Into<String>,
        tool: impl Into<String>,
        decision: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            tenant: tenant.into(),
            subject: subject.into(),
            tool: tool.into(),
            args: Value::Null,
            decision: decision.into(),
            rule: rule.into(),
            result_meta: Value::Null,
            approver: None,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    pub fn with_result_meta(mut self, meta: Value) -> Self {
        self.result_meta = meta;
        self
    }

    pub fn with_approver(mut self, approver: impl Into<String>) -> Self {
        self.approver = Some(approver.into());
        self
    }
}
