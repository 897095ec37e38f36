// engine.rs — Policy evaluation engine.
//
// Rules are checked in declared order; the first rule whose tool match and
// `where` predicates all hold decides the outcome. No match falls through
// to `defaults.decision`.
//
// The predicate set is closed: method, host_in, path_not_under,
// body_bytes_over, estimated_cost_usd_over. Unknown keys are vacuously
// true (forward compatibility) and flagged in the trace. Thresholds are
// strict `>` — boundary values do not trigger the rule.

use serde::Serialize;
use serde_json::Value;
use serde_yaml::Value as YamlValue;

use crate::args;
use crate::bundle::{Bundle, Outcome, Rule};

/// The result of evaluating a tool call against the policy.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Decision {
    pub outcome: Outcome,
    /// Name of the rule that decided, or `__default__`.
    pub rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub required_approvals: u32,
}

/// One predicate check inside a trace step.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredicateCheck {
    pub ok: bool,
    pub note: String,
}

/// Per-rule record in an evaluation trace.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TraceStep {
    pub rule: String,
    /// Set when the rule never reached predicate evaluation
    /// (currently only `tool-mismatch`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    /// Whether all predicates held. Absent on skipped steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<PredicateCheck>,
}

/// A decision together with the full per-rule trace — the simulator's
/// response body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Evaluation {
    #[serde(flatten)]
    pub decision: Decision,
    pub trace: Vec<TraceStep>,
}

/// Compiled policy engine. Pure: the same `(tool, args)` always produces
/// the same decision for a given bundle.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    bundle: Bundle,
}

impl PolicyEngine {
    pub fn new(bundle: Bundle) -> Self {
        Self { bundle }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// Evaluate a tool call. Delegates to [`evaluate_with_trace`] and
    /// drops the trace, so the two can never disagree.
    ///
    /// [`evaluate_with_trace`]: Self::evaluate_with_trace
    pub fn evaluate(&self, tool: &str, tool_args: &Value) -> Decision {
        self.evaluate_with_trace(tool, tool_args).decision
    }

    /// Evaluate a tool call, recording every rule skipped or checked.
    pub fn evaluate_with_trace(&self, tool: &str, tool_args: &Value) -> Evaluation {
        let mut trace = Vec::with_capacity(self.bundle.rules.len() + 1);

        for rule in &self.bundle.rules {
            if !rule.covers_tool(tool) {
                trace.push(TraceStep {
                    rule: rule.name.clone(),
                    skipped: Some("tool-mismatch".to_string()),
                    matched: None,
                    checks: Vec::new(),
                });
                continue;
            }

            let (matched, checks) = check_conditions(rule, tool_args);
            trace.push(TraceStep {
                rule: rule.name.clone(),
                skipped: None,
                matched: Some(matched),
                checks,
            });

            if matched {
                return Evaluation {
                    decision: Decision {
                        outcome: rule.action,
                        rule: rule.name.clone(),
                        reason: rule.reason.clone(),
                        required_approvals: rule.required_approvals,
                    },
                    trace,
                };
            }
        }

        trace.push(TraceStep {
            rule: "__default__".to_string(),
            skipped: None,
            matched: Some(true),
            checks: vec![PredicateCheck {
                ok: true,
                note: "no rules matched".to_string(),
            }],
        });
        Evaluation {
            decision: Decision {
                outcome: self.bundle.defaults.decision,
                rule: "__default__".to_string(),
                reason: Some("no rules matched".to_string()),
                required_approvals: 1,
            },
            trace,
        }
    }
}

/// Evaluate a rule's `where` predicates in declared order. Stops at the
/// first failure; its check record is the last entry.
fn check_conditions(rule: &Rule, tool_args: &Value) -> (bool, Vec<PredicateCheck>) {
    if rule.conditions.is_empty() {
        return (
            true,
            vec![PredicateCheck {
                ok: true,
                note: "no conditions".to_string(),
            }],
        );
    }

    let mut checks = Vec::with_capacity(rule.conditions.len());
    for (key, expected) in &rule.conditions {
        let key = key.as_str().unwrap_or_default();
        let check = check_predicate(key, expected, tool_args);
        let ok = check.ok;
        checks.push(check);
        if !ok {
            return (false, checks);
        }
    }
    (true, checks)
}

fn check_predicate(key: &str, expected: &YamlValue, tool_args: &Value) -> PredicateCheck {
    match key {
        "method" => {
            let want = expected.as_str().unwrap_or_default();
            let got = args::get_str(tool_args, "method");
            if got == Some(want) {
                ok(format!("method == {want}"))
            } else {
                fail(format!("method != {want}"))
            }
        }
        "host_in" => {
            let host = args::host_of(tool_args);
            if yaml_str_list(expected).iter().any(|allowed| allowed == &host) {
                ok(format!("host '{host}' allowed"))
            } else {
                fail(format!("host '{host}' not in allowlist"))
            }
        }
        // Historical name: despite the "not", the tested semantics is
        // "path must be under one of the listed prefixes".
        "path_not_under" => {
            let path = args::get_str(tool_args, "path").unwrap_or("");
            let under = !path.is_empty()
                && yaml_str_list(expected)
                    .iter()
                    .any(|prefix| path.starts_with(prefix.as_str()));
            if under {
                ok("path under permitted prefixes".to_string())
            } else {
                fail("path is outside permitted prefixes".to_string())
            }
        }
        "body_bytes_over" => {
            let threshold = yaml_i64(expected);
            let size = args::byte_len_of(tool_args, "body") as i64;
            if size > threshold {
                ok(format!("body {size} exceeds threshold {threshold}"))
            } else {
                fail(format!("body size {size} <= threshold {threshold}"))
            }
        }
        "estimated_cost_usd_over" => {
            let threshold = yaml_f64(expected);
            let cost = args::get_f64_or(tool_args, "estimated_cost_usd", 0.0);
            if cost > threshold {
                ok(format!("estimated cost {cost} exceeds threshold {threshold}"))
            } else {
                fail(format!("estimated_cost_usd {cost} <= {threshold}"))
            }
        }
        // Unknown predicates are vacuously true so newer bundles keep
        // working against older gateways; the trace makes this visible.
        other => ok(format!("unknown_predicate: {other}")),
    }
}

fn ok(note: String) -> PredicateCheck {
    PredicateCheck { ok: true, note }
}

fn fail(note: String) -> PredicateCheck {
    PredicateCheck { ok: false, note }
}

fn yaml_str_list(value: &YamlValue) -> Vec<String> {
    match value {
        YamlValue::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn yaml_i64(value: &YamlValue) -> i64 {
    value.as_i64().unwrap_or_else(|| value.as_f64().unwrap_or(0.0) as i64)
}

fn yaml_f64(value: &YamlValue) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use serde_json::json;

    fn engine(yaml: &str) -> PolicyEngine {
        PolicyEngine::new(Bundle::from_yaml(yaml).unwrap())
    }

    const NET_POLICY: &str = r#"
defaults:
  decision: deny
rules:
  - name: api-egress
    match: net.http
    where:
      method: GET
      host_in: ["api.example.com"]
    action: allow
  - name: big-uploads
    match: net.http
    where:
      body_bytes_over: 1024
    action: approval
    reason: "Large body"
"#;

    #[test]
    fn first_matching_rule_wins() {
        let e = engine(NET_POLICY);
        let d = e.evaluate(
            "net.http",
            &json!({"method": "GET", "url": "https://api.example.com/v1"}),
        );
        assert_eq!(d.outcome, Outcome::Allow);
        assert_eq!(d.rule, "api-egress");
    }

    #[test]
    fn falls_through_to_default() {
        let e = engine(NET_POLICY);
        let d = e.evaluate("net.http", &json!({"method": "POST", "url": "https://evil.example/"}));
        assert_eq!(d.outcome, Outcome::Deny);
        assert_eq!(d.rule, "__default__");
        assert_eq!(d.reason.as_deref(), Some("no rules matched"));
        assert_eq!(d.required_approvals, 1);
    }

    #[test]
    fn evaluate_agrees_with_trace_variant() {
        let e = engine(NET_POLICY);
        for call_args in [
            json!({"method": "GET", "url": "https://api.example.com/v1"}),
            json!({"method": "POST", "body": "x"}),
            json!({}),
        ] {
            let plain = e.evaluate("net.http", &call_args);
            let traced = e.evaluate_with_trace("net.http", &call_args);
            assert_eq!(plain, traced.decision);
        }
    }

    #[test]
    fn tool_mismatch_is_traced_as_skipped() {
        let e = engine(NET_POLICY);
        let ev = e.evaluate_with_trace("fs.write", &json!({}));
        assert_eq!(ev.trace[0].skipped.as_deref(), Some("tool-mismatch"));
        assert_eq!(ev.trace[1].skipped.as_deref(), Some("tool-mismatch"));
        assert_eq!(ev.decision.rule, "__default__");
    }

    #[test]
    fn empty_where_matches_on_tool_name_alone() {
        let e = engine("rules:\n  - name: r\n    match: t\n    action: allow\n");
        let d = e.evaluate("t", &json!({}));
        assert_eq!(d.outcome, Outcome::Allow);
        assert_eq!(d.rule, "r");
    }

    #[test]
    fn unknown_predicate_is_vacuously_true_and_flagged() {
        let e = engine(
            "rules:\n  - name: r\n    match: t\n    where:\n      future_key: 1\n    action: deny\n",
        );
        let ev = e.evaluate_with_trace("t", &json!({}));
        assert_eq!(ev.decision.outcome, Outcome::Deny);
        let checks = &ev.trace[0].checks;
        assert!(checks.iter().any(|c| c.note == "unknown_predicate: future_key"));
    }

    #[test]
    fn missing_url_fails_host_in() {
        let e = engine(
            "defaults:\n  decision: allow\nrules:\n  - name: r\n    match: t\n    where:\n      host_in: [\"a.example\"]\n    action: deny\n",
        );
        let d = e.evaluate("t", &json!({}));
        assert_eq!(d.rule, "__default__");
    }

    #[test]
    fn missing_path_fails_path_not_under() {
        let e = engine(
            "defaults:\n  decision: allow\nrules:\n  - name: r\n    match: fs.write\n    where:\n      path_not_under: [\"/tmp/\"]\n    action: deny\n",
        );
        // No path at all: predicate fails, rule does not match.
        let d = e.evaluate("fs.write", &json!({}));
        assert_eq!(d.rule, "__default__");
        // Path under the prefix: rule matches.
        let d = e.evaluate("fs.write", &json!({"path": "/tmp/x"}));
        assert_eq!(d.rule, "r");
    }

    #[test]
    fn body_bytes_over_is_strictly_greater() {
        let e = engine(
            "defaults:\n  decision: allow\nrules:\n  - name: r\n    match: t\n    where:\n      body_bytes_over: 4\n    action: deny\n",
        );
        assert_eq!(e.evaluate("t", &json!({"body": "abcd"})).rule, "__default__");
        assert_eq!(e.evaluate("t", &json!({"body": "abcde"})).rule, "r");
    }

    #[test]
    fn cost_threshold_is_strictly_greater() {
        let e = engine(
            "defaults:\n  decision: allow\nrules:\n  - name: r\n    match: t\n    where:\n      estimated_cost_usd_over: 10\n    action: approval\n",
        );
        assert_eq!(e.evaluate("t", &json!({"estimated_cost_usd": 10})).rule, "__default__");
        assert_eq!(e.evaluate("t", &json!({"estimated_cost_usd": 10.01})).rule, "r");
        // Absent cost defaults to 0.
        assert_eq!(e.evaluate("t", &json!({})).rule, "__default__");
    }

    #[test]
    fn comparisons_are_case_sensitive() {
        let e = engine(
            "defaults:\n  decision: allow\nrules:\n  - name: r\n    match: t\n    where:\n      method: GET\n    action: deny\n",
        );
        assert_eq!(e.evaluate("t", &json!({"method": "get"})).rule, "__default__");
        assert_eq!(e.evaluate("t", &json!({"method": "GET"})).rule, "r");
    }

    #[test]
    fn first_failing_predicate_ends_the_checks() {
        let e = engine(
            "rules:\n  - name: r\n    match: t\n    where:\n      method: GET\n      host_in: [\"a\"]\n    action: allow\n",
        );
        let ev = e.evaluate_with_trace("t", &json!({"method": "POST"}));
        let step = &ev.trace[0];
        assert_eq!(step.matched, Some(false));
        assert_eq!(step.checks.len(), 1);
        assert!(!step.checks[0].ok);
    }
}
