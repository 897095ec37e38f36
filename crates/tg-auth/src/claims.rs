// claims.rs — Verified token claims, as the gateway reads them.
//
// Claims arrive as arbitrary JSON; the accessors tolerate the shapes
// real identity providers emit (`roles` as a list, `role` as a single
// string) and default tenant to "default" when absent.

use serde_json::Value;

/// The subset of token claims the gateway acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub tenant: String,
    pub roles: Vec<String>,
}

impl Claims {
    /// Extract from a decoded claim set.
    pub fn from_value(value: &Value) -> Self {
        let sub = value
            .get("sub")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let tenant = value
            .get("tenant")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();

        // `roles` may be a list or a single string; `role` is a legacy
        // single-string spelling some issuers use.
        let roles_value = value.get("roles").or_else(|| value.get("role"));
        let roles = match roles_value {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        Self { sub, tenant, roles }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
