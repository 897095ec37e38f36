// args.rs — Narrow accessors over externally-sourced tool arguments.
//
// Tool arguments arrive as arbitrary JSON. The engine never indexes into
// them directly: every access goes through these helpers so that a missing
// or mistyped field becomes predicate-false instead of a crash.

use serde_json::Value;

/// Read `args[key]` as a string, if present and actually a string.
pub fn get_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Read `args[key]` as a float, accepting JSON numbers and numeric
/// strings, falling back to `default` otherwise.
pub fn get_f64_or(args: &Value, key: &str, default: f64) -> f64 {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// UTF-8 byte length of `args[key]`: the raw length for strings, the
/// length of the JSON serialization for anything else, 0 when absent.
pub fn byte_len_of(args: &Value, key: &str) -> usize {
    match args.get(key) {
        None | Some(Value::Null) => 0,
        Some(Value::String(s)) => s.len(),
        Some(other) => serde_json::to_string(other).map(|s| s.len()).unwrap_or(0),
    }
}

/// Extract the host from `args.url`: the text after `://` up to the first
/// `/` (or, with no scheme, up to the first `/`). Missing url yields "".
pub fn host_of(args: &Value) -> String {
    let url = get_str(args, "url").unwrap_or("");
    let after_scheme = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    };
    after_scheme
        .split('/')
        .next()
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_str_rejects_non_strings() {
        let args = json!({"method": "GET", "count": 3});
        assert_eq!(get_str(&args, "method"), Some("GET"));
        assert_eq!(get_str(&args, "count"), None);
        assert_eq!(get_str(&args, "missing"), None);
    }

    #[test]
    fn get_f64_parses_numbers_and_numeric_strings() {
        let args = json!({"cost": 12.5, "as_text": "3.25", "junk": "abc"});
        assert_eq!(get_f64_or(&args, "cost", 0.0), 12.5);
        assert_eq!(get_f64_or(&args, "as_text", 0.0), 3.25);
        assert_eq!(get_f64_or(&args, "junk", 0.0), 0.0);
        assert_eq!(get_f64_or(&args, "missing", 7.0), 7.0);
    }

    #[test]
    fn byte_len_counts_utf8_bytes_for_strings() {
        let args = json!({"body": "héllo"});
        assert_eq!(byte_len_of(&args, "body"), 6);
    }

    #[test]
    fn byte_len_serializes_non_strings() {
        let args = json!({"body": {"a": 1}});
        // {"a":1} — 7 bytes of JSON.
        assert_eq!(byte_len_of(&args, "body"), 7);
        assert_eq!(byte_len_of(&args, "missing"), 0);
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_of(&json!({"url": "https://api.example.com/v1/x"})), "api.example.com");
        assert_eq!(host_of(&json!({"url": "example.com/path"})), "example.com");
        assert_eq!(host_of(&json!({"url": ""})), "");
        assert_eq!(host_of(&json!({})), "");
    }
}
