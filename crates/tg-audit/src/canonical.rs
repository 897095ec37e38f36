// canonical.rs — Canonical JSON for audit hashing.
//
// The hash chain is only reproducible if every writer serializes entries
// identically. The canonical form is:
//   - object keys sorted lexicographically (bytewise) at every level,
//   - no whitespace,
//   - strings escaped by serde_json's standard escaper,
//   - numbers printed by serde_json's shortest-round-trip formatter,
//   - null/true/false literal.
// This must not change once audit rows exist in the field.

use serde_json::Value;

/// Serialize a JSON value into its canonical string form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => {
            out.push_str(&value.to_string());
        }
        Value::String(s) => {
            out.push_str(&serde_json::to_string(s).expect("string serializes"));
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key).expect("key serializes"));
                out.push(':');
                write_value(out, &map[*key]);
            }
            out.push('}');
        }
    }
}
