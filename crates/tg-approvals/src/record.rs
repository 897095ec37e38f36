// record.rs — Pending approval record and its KV hash mapping.
//
// Records live at `appr:<id>` as flat string-to-string hashes (the only
// shape every KV backend supports). `rev` is the optimistic-concurrency
// counter; it is bumped on every successful CAS and never exposed in API
// responses.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::ApprovalError;

/// Approval lifecycle state. `Allow` and `Deny` are absorbing.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Allow,
    Deny,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Allow => "allow",
            ApprovalStatus::Deny => "deny",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ApprovalStatus::Pending),
            "allow" => Some(ApprovalStatus::Allow),
            "deny" => Some(ApprovalStatus::Deny),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending approval.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApprovalRecord {
    pub id: String,
    /// Creation time, unix seconds.
    pub created_ts: i64,
    /// Decision time, set exactly once when the record turns terminal.
    pub decided_ts: Option<i64>,
    pub tenant: String,
    pub requester: String,
    pub tool: String,
    pub args: Value,
    pub status: ApprovalStatus,
    pub required_approvals: u32,
    /// Distinct approver ids that approved. Survives a later deny.
    pub approvals: Vec<String>,
    /// Distinct approver ids that rejected.
    pub rejections: Vec<String>,
    pub reason: String,
    /// Optimistic-concurrency counter (internal).
    #[serde(skip)]
    pub rev: u64,
}

impl ApprovalRecord {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ApprovalStatus::Allow | ApprovalStatus::Deny)
    }

    /// Flatten into the KV hash representation.
    pub fn to_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        fields.insert("pending_id".into(), self.id.clone());
        fields.insert("created_ts".into(), self.created_ts.to_string());
        fields.insert(
            "decided_ts".into(),
            self.decided_ts.unwrap_or(0).to_string(),
        );
        fields.insert("tenant".into(), self.tenant.clone());
        fields.insert("requester".into(), self.requester.clone());
        fields.insert("tool".into(), self.tool.clone());
        fields.insert("args_json".into(), self.args.to_string());
        fields.insert("status".into(), self.status.as_str().into());
        fields.insert(
            "required_approvals".into(),
            self.required_approvals.to_string(),
        );
        fields.insert(
            "approvals".into(),
            serde_json::to_string(&self.approvals).expect("string list serializes"),
        );
        fields.insert(
            "rejections".into(),
            serde_json::to_string(&self.rejections).expect("string list serializes"),
        );
        fields.insert("reason".into(), self.reason.clone());
        fields.insert(tg_kv::store::REV_FIELD.into(), self.rev.to_string());
        fields
    }

    /// Rebuild from the KV hash representation.
    pub fn from_fields(id: &str, fields: &HashMap<String, String>) -> Result<Self, ApprovalError> {
        let corrupt = |detail: &str| ApprovalError::Corrupt {
            id: id.to_string(),
            detail: detail.to_string(),
        };
        let field = |name: &str| fields.get(name).cloned().unwrap_or_default();

        let status = ApprovalStatus::parse(&field("status"))
            .ok_or_else(|| corrupt("unparseable status"))?;
        let decided_ts: i64 = field("decided_ts").parse().unwrap_or(0);

        Ok(Self {
            id: id.to_string(),
            created_ts: field("created_ts").parse().unwrap_or(0),
            decided_ts: (decided_ts != 0).then_some(decided_ts),
            tenant: field("tenant"),
            requester: field("requester"),
            tool: field("tool"),
            args: serde_json::from_str(&field("args_json")).unwrap_or(Value::Null),
            status,
            required_approvals: field("required_approvals").parse().unwrap_or(1),
            approvals: serde_json::from_str(&field("approvals")).unwrap_or_default(),
            rejections: serde_json::from_str(&field("rejections")).unwrap_or_default(),
            reason: field("reason"),
            rev: field(tg_kv::store::REV_FIELD).parse().unwrap_or(0),
        })
    }
}
