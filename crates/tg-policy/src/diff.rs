// diff.rs — Structural diff between two policy bundles.
//
// Rules are keyed by "<match>/<name>" so a rule keeps its identity when
// its body changes. Equality is on the fields that affect enforcement:
// match, where, action, required_approvals, reason. The headline collects
// the changes a reviewer should look at first.

use serde::Serialize;

use crate::bundle::{Bundle, Defaults, Outcome, Rule};

/// Identity key for a rule within a bundle.
fn rule_key(rule: &Rule) -> String {
    format!(
        "{}/{}",
        rule.match_tool.as_deref().unwrap_or("*"),
        rule.name
    )
}

/// The enforcement-relevant fields match exactly.
fn rule_equal(a: &Rule, b: &Rule) -> bool {
    a.match_tool == b.match_tool
        && a.conditions == b.conditions
        && a.action == b.action
        && a.required_approvals == b.required_approvals
        && a.reason == b.reason
}

/// One changed field on a modified rule.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldChange {
    pub field: &'static str,
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

/// A rule present on one side only.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RuleEntry {
    pub id: String,
    pub rule: Rule,
}

/// A rule present on both sides with differing bodies.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModifiedRule {
    pub id: String,
    pub before: Rule,
    pub after: Rule,
    pub changes: Vec<FieldChange>,
}

/// Change in bundle defaults.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DefaultsChange {
    pub from: Defaults,
    pub to: Defaults,
}

/// The full diff result returned by `policy/diff`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BundleDiff {
    pub added: Vec<RuleEntry>,
    pub removed: Vec<RuleEntry>,
    pub modified: Vec<ModifiedRule>,
    pub defaults: DefaultsChange,
    /// Human-readable risk summary, most significant first.
    pub headline: Vec<String>,
}

/// Compare two bundles (`a` = current, `b` = proposed).
pub fn compare(a: &Bundle, b: &Bundle) -> BundleDiff {
    let index_a: Vec<(String, &Rule)> = a.rules.iter().map(|r| (rule_key(r), r)).collect();
    let index_b: Vec<(String, &Rule)> = b.rules.iter().map(|r| (rule_key(r), r)).collect();

    let lookup = |index: &[(String, &Rule)], key: &str| -> Option<Rule> {
        index
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, r)| (*r).clone())
    };

    let mut added: Vec<RuleEntry> = index_b
        .iter()
        .filter(|(k, _)| lookup(&index_a, k).is_none())
        .map(|(k, r)| RuleEntry {
            id: k.clone(),
            rule: (*r).clone(),
        })
        .collect();
    added.sort_by(|x, y| x.id.cmp(&y.id));

    let mut removed: Vec<RuleEntry> = index_a
        .iter()
        .filter(|(k, _)| lookup(&index_b, k).is_none())
        .map(|(k, r)| RuleEntry {
            id: k.clone(),
            rule: (*r).clone(),
        })
        .collect();
    removed.sort_by(|x, y| x.id.cmp(&y.id));

    let mut modified = Vec::new();
    for (key, before) in &index_a {
        let Some(after) = lookup(&index_b, key) else {
            continue;
        };
        if rule_equal(before, &after) {
            continue;
        }
        modified.push(ModifiedRule {
            id: key.clone(),
            changes: field_changes(before, &after),
            before: (*before).clone(),
            after,
        });
    }
    modified.sort_by(|x, y| x.id.cmp(&y.id));

    let headline = risk_headline(&added, &modified);
    BundleDiff {
        added,
        removed,
        modified,
        defaults: DefaultsChange {
            from: a.defaults.clone(),
            to: b.defaults.clone(),
        },
        headline,
    }
}

fn field_changes(a: &Rule, b: &Rule) -> Vec<FieldChange> {
    let mut out = Vec::new();
    let mut push = |field: &'static str, from: serde_json::Value, to: serde_json::Value| {
        if from != to {
            out.push(FieldChange { field, from, to });
        }
    };
    push("match", json_of(&a.match_tool), json_of(&b.match_tool));
    push("where", json_of(&a.conditions), json_of(&b.conditions));
    push("action", json_of(&a.action), json_of(&b.action));
    push(
        "required_approvals",
        json_of(&a.required_approvals),
        json_of(&b.required_approvals),
    );
    push("reason", json_of(&a.reason), json_of(&b.reason));
    out
}

fn json_of<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn risk_headline(added: &[RuleEntry], modified: &[ModifiedRule]) -> Vec<String> {
    let mut notes = Vec::new();
    for entry in added {
        match entry.rule.action {
            Outcome::Allow => notes.push(format!("New allow: {}", entry.id)),
            Outcome::Approval => notes.push(format!("New approval flow: {}", entry.id)),
            Outcome::Deny => {}
        }
    }
    for m in modified {
        if m.before.action != m.after.action {
            notes.push(format!(
                "Action change {}: {} → {}",
                m.id, m.before.action, m.after.action
            ));
        }
        if m.before.conditions.get("host_in") != m.after.conditions.get("host_in") {
            notes.push(format!("Changed host_in: {}", m.id));
        }
        if m.before.required_approvals != m.after.required_approvals {
            notes.push(format!(
                "Approval quorum change {}: {} → {}",
                m.id, m.before.required_approvals, m.after.required_approvals
            ));
        }
    }
    if notes.is_empty() {
        notes.push("No high-risk changes detected.".to_string());
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(yaml: &str) -> Bundle {
        Bundle::from_yaml(yaml).unwrap()
    }

    #[test]
    fn identical_bundles_have_no_risk() {
        let a = bundle("rules:\n  - name: r\n    match: t\n    action: deny\n");
        let d = compare(&a, &a.clone());
        assert!(d.added.is_empty());
        assert!(d.removed.is_empty());
        assert!(d.modified.is_empty());
        assert_eq!(d.headline, vec!["No high-risk changes detected.".to_string()]);
    }

    #[test]
    fn added_allow_rule_is_flagged() {
        let a = bundle("rules: []");
        let b = bundle("rules:\n  - name: open-door\n    match: net.http\n    action: allow\n");
        let d = compare(&a, &b);
        assert_eq!(d.added.len(), 1);
        assert_eq!(d.added[0].id, "net.http/open-door");
        assert!(d.headline.iter().any(|n| n.contains("New allow: net.http/open-door")));
    }

    #[test]
    fn action_change_is_flagged() {
        let a = bundle("rules:\n  - name: r\n    match: t\n    action: deny\n");
        let b = bundle("rules:\n  - name: r\n    match: t\n    action: allow\n");
        let d = compare(&a, &b);
        assert_eq!(d.modified.len(), 1);
        assert!(d.modified[0].changes.iter().any(|c| c.field == "action"));
        assert!(d.headline.iter().any(|n| n.contains("Action change t/r: deny → allow")));
    }

    #[test]
    fn host_allowlist_change_is_flagged() {
        let a = bundle(
            "rules:\n  - name: r\n    match: t\n    where:\n      host_in: [\"a.example\"]\n    action: allow\n",
        );
        let b = bundle(
            "rules:\n  - name: r\n    match: t\n    where:\n      host_in: [\"a.example\", \"b.example\"]\n    action: allow\n",
        );
        let d = compare(&a, &b);
        assert!(d.headline.iter().any(|n| n.contains("Changed host_in: t/r")));
    }

    #[test]
    fn quorum_change_is_flagged() {
        let a = bundle("rules:\n  - name: r\n    match: t\n    action: approval\n    required_approvals: 2\n");
        let b = bundle("rules:\n  - name: r\n    match: t\n    action: approval\n    required_approvals: 1\n");
        let d = compare(&a, &b);
        assert!(d
            .headline
            .iter()
            .any(|n| n.contains("Approval quorum change t/r: 2 → 1")));
    }

    #[test]
    fn removed_rules_are_listed() {
        let a = bundle("rules:\n  - name: r\n    match: t\n    action: deny\n");
        let b = bundle("rules: []");
        let d = compare(&a, &b);
        assert_eq!(d.removed.len(), 1);
        assert_eq!(d.removed[0].id, "t/r");
    }

    #[test]
    fn rules_with_same_name_different_match_are_distinct() {
        let a = bundle("rules:\n  - name: r\n    match: t1\n    action: deny\n");
        let b = bundle("rules:\n  - name: r\n    match: t2\n    action: deny\n");
        let d = compare(&a, &b);
        assert_eq!(d.added.len(), 1);
        assert_eq!(d.removed.len(), 1);
    }
}
