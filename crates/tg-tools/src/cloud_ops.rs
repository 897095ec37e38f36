// cloud_ops.rs — Mock cloud operation executor.
//
// Stands in for a real provisioning backend: echoes back a synthetic
// resource id so end-to-end flows (policy → approval → execute → audit)
// have a concrete result to carry.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::registry::{CallCtx, HandlerError};

pub fn schema() -> Value {
    json!({
        "title": "Cloud Operations",
        "description": "Execute cloud operations (mock implementation)",
        "inputSchema": {
            "type": "object",
            "properties": {
                "provider": {"type": "string", "enum": ["aws", "gcp", "azure"]},
                "resource": {"type": "string"},
                "action": {"type": "string"},
                "estimated_cost_usd": {"type": "number", "minimum": 0}
            },
            "required": ["provider", "resource", "action"]
        },
        "outputSchema": {
            "type": "object",
            "properties": {
                "success": {"type": "boolean"},
                "resource_id": {"type": "string"},
                "cost_usd": {"type": "number"}
            },
            "required": ["success"]
        }
    })
}

pub fn execute(args: &Value, _ctx: &CallCtx) -> Result<Value, HandlerError> {
    let provider = args["provider"].as_str().unwrap_or("unknown");
    let resource = args["resource"].as_str().unwrap_or("unknown");
    let action = args["action"].as_str().unwrap_or("unknown");
    let cost = args["estimated_cost_usd"].as_f64().unwrap_or(0.0);

    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    Ok(json!({
        "success": true,
        "resource_id": format!("{provider}-{resource}-{suffix}"),
        "cost_usd": cost,
        "provider": provider,
        "action": action
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_synthetic_resource_id() {
        let ctx = CallCtx {
            tenant: "t".into(),
            subject: "s".into(),
        };
        let result = execute(
            &json!({"provider": "aws", "resource": "ec2", "action": "start", "estimated_cost_usd": 3.5}),
            &ctx,
        )
        .unwrap();
        assert_eq!(result["success"], true);
        assert_eq!(result["cost_usd"], 3.5);
        let id = result["resource_id"].as_str().unwrap();
        assert!(id.starts_with("aws-ec2-"));
    }
}
