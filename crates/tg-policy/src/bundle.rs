// bundle.rs — Policy bundle document model.
//
// A bundle is a YAML mapping `{defaults, rules}`. Rules are ordered and
// evaluated first-match-wins. The `where` mapping keeps its declared key
// order (serde_yaml::Mapping is insertion-ordered), which matters for the
// evaluation trace: predicates are checked in the order the author wrote
// them.

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

use crate::error::PolicyError;

/// The three possible outcomes a rule (or the default) can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allow,
    Deny,
    Approval,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allow => "allow",
            Outcome::Deny => "deny",
            Outcome::Approval => "approval",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bundle-level defaults. `decision` applies when no rule matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Defaults {
    #[serde(default = "default_decision")]
    pub decision: Outcome,
}

fn default_decision() -> Outcome {
    Outcome::Deny
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            decision: Outcome::Deny,
        }
    }
}

/// A single policy rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Opaque label, echoed in decisions, traces, and audit entries.
    pub name: String,

    /// Exact tool name this rule applies to; `*` (or absent) matches any.
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_tool: Option<String>,

    /// Predicate map, checked in declared order. Empty means the rule
    /// matches on tool name alone.
    #[serde(rename = "where", default, skip_serializing_if = "Mapping::is_empty")]
    pub conditions: Mapping,

    pub action: Outcome,

    /// Distinct approvers needed to flip an `approval` outcome to allow.
    #[serde(default = "default_required_approvals")]
    pub required_approvals: u32,

    /// Human-readable rationale, echoed to the caller on deny/approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Which approver group should be notified (opaque to the engine).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_group: Option<String>,
}

fn default_required_approvals() -> u32 {
    1
}

impl Rule {
    /// Does this rule's `match` field cover the given tool name?
    pub fn covers_tool(&self, tool: &str) -> bool {
        match self.match_tool.as_deref() {
            None | Some("*") => true,
            Some(pattern) => pattern == tool,
        }
    }
}

/// A parsed policy bundle: defaults plus an ordered rule list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Bundle {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Bundle {
    /// Parse a bundle from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, PolicyError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a bundle file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PolicyError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
defaults:
  decision: allow
rules:
  - name: block-writes-outside-tmp
    match: fs.write
    where:
      path_not_under: ["/tmp/"]
    action: deny
    reason: "Writes restricted to /tmp"
  - name: expensive-cloud-ops
    match: cloud.ops
    where:
      estimated_cost_usd_over: 10
    action: approval
    required_approvals: 2
    reason: "High cost"
    approver_group: platform
"#;

    #[test]
    fn parses_sample_bundle() {
        let bundle = Bundle::from_yaml(SAMPLE).unwrap();
        assert_eq!(bundle.defaults.decision, Outcome::Allow);
        assert_eq!(bundle.rules.len(), 2);
        assert_eq!(bundle.rules[0].match_tool.as_deref(), Some("fs.write"));
        assert_eq!(bundle.rules[0].action, Outcome::Deny);
        assert_eq!(bundle.rules[1].required_approvals, 2);
        assert_eq!(bundle.rules[1].approver_group.as_deref(), Some("platform"));
    }

    #[test]
    fn defaults_to_deny_when_absent() {
        let bundle = Bundle::from_yaml("rules: []").unwrap();
        assert_eq!(bundle.defaults.decision, Outcome::Deny);
    }

    #[test]
    fn required_approvals_defaults_to_one() {
        let bundle = Bundle::from_yaml(
            "rules:\n  - name: r\n    match: t\n    action: approval\n",
        )
        .unwrap();
        assert_eq!(bundle.rules[0].required_approvals, 1);
    }

    #[test]
    fn wildcard_and_absent_match_cover_any_tool() {
        let bundle = Bundle::from_yaml(
            "rules:\n  - name: a\n    match: \"*\"\n    action: deny\n  - name: b\n    action: deny\n",
        )
        .unwrap();
        assert!(bundle.rules[0].covers_tool("anything"));
        assert!(bundle.rules[1].covers_tool("anything"));
    }

    #[test]
    fn where_preserves_declared_order() {
        let bundle = Bundle::from_yaml(
            "rules:\n  - name: r\n    match: t\n    where:\n      zeta: 1\n      alpha: 2\n    action: deny\n",
        )
        .unwrap();
        let keys: Vec<String> = bundle.rules[0]
            .conditions
            .iter()
            .map(|(k, _)| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }
}
