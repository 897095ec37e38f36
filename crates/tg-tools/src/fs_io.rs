// fs_io.rs — Mock filesystem write.
//
// Decodes the base64 payload and reports the byte count without touching
// disk. Decode failures are reported in the result body (success: false)
// rather than as a handler error, matching the schema's contract.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::registry::{CallCtx, HandlerError};

pub fn schema() -> Value {
    json!({
        "title": "File System Write",
        "description": "Write data to filesystem (mock implementation)",
        "inputSchema": {
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "bytes": {"type": "string", "description": "Base64 encoded data"}
            },
            "required": ["path", "bytes"]
        },
        "outputSchema": {
            "type": "object",
            "properties": {
                "success": {"type": "boolean"},
                "bytes_written": {"type": "number"}
            },
            "required": ["success"]
        }
    })
}

pub fn write(args: &Value, _ctx: &CallCtx) -> Result<Value, HandlerError> {
    let path = args["path"].as_str().unwrap_or_default();
    let data_b64 = args["bytes"].as_str().unwrap_or_default();

    match B64.decode(data_b64) {
        Ok(data) => Ok(json!({
            "success": true,
            "bytes_written": data.len(),
            "path": path
        })),
        Err(e) => Ok(json!({
            "success": false,
            "error": e.to_string()
        })),
    }
}
