// cost_estimator.rs — Static cloud cost estimator.
//
// A deliberately rough pricebook: enough for policies keyed on
// estimated_cost_usd to have something to chew on before cloud.ops runs.

use serde_json::{json, Value};

use crate::registry::{CallCtx, HandlerError};

/// (provider, action) → (unit, usd_per_unit).
fn price_of(provider: &str, action: &str) -> Option<(&'static str, f64)> {
    match (provider, action) {
        ("aws", "run_instances") => Some(("instance-hour", 0.0832)),
        ("aws", "s3_put") => Some(("gb", 0.023)),
        ("gcp", "run_instances") => Some(("instance-hour", 0.0760)),
        ("gcp", "gcs_put") => Some(("gb", 0.020)),
        ("azure", "run_instances") => Some(("instance-hour", 0.0912)),
        _ => None,
    }
}

pub fn schema() -> Value {
    json!({
        "title": "Cloud Cost Estimator",
        "description": "Rough, static estimator for cloud ops; use before cloud.ops",
        "inputSchema": {
            "type": "object",
            "properties": {
                "provider": {"type": "string", "enum": ["aws", "gcp", "azure"]},
                "action": {"type": "string"},
                "units": {"type": "number", "minimum": 0}
            },
            "required": ["provider", "action", "units"]
        },
        "outputSchema": {
            "type": "object",
            "properties": {
                "estimated_cost_usd": {"type": "number"},
                "unit": {"type": "string"},
                "usd_per_unit": {"type": "number"},
                "source": {"type": "string"}
            },
            "required": ["estimated_cost_usd"]
        }
    })
}

pub fn estimate(args: &Value, _ctx: &CallCtx) -> Result<Value, HandlerError> {
    let provider = args["provider"].as_str().unwrap_or_default();
    let action = args["action"].as_str().unwrap_or_default();
    let units = args["units"].as_f64().unwrap_or(0.0);

    let (unit, usd_per_unit) = price_of(provider, action)
        .ok_or_else(|| HandlerError(format!("No price mapping for {provider}.{action}")))?;

    let estimate = (usd_per_unit * units * 10_000.0).round() / 10_000.0;
    Ok(json!({
        "estimated_cost_usd": estimate,
        "unit": unit,
        "usd_per_unit": usd_per_unit,
        "source": "static-pricebook"
    }))
}
