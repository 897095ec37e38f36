// registry.rs — name → {schema, handler} mapping.

use serde_json::Value;
use thiserror::Error;

/// Caller identity passed to every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallCtx {
    pub tenant: String,
    pub subject: String,
}

/// A handler failure. Surfaces to the client as `Tool error: <message>`
/// inside the tool reply, never as a transport error.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Registry lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No tool registered under this name (JSON-RPC -32602).
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

type Handler = Box<dyn Fn(&Value, &CallCtx) -> Result<Value, HandlerError> + Send + Sync>;

struct RegisteredTool {
    name: String,
    schema: Value,
    handler: Handler,
}

/// Ordered tool registry.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Empty registry (tests compose their own).
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// The standard registry: estimator, cloud ops, filesystem write.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            "cloud.estimate",
            crate::cost_estimator::schema(),
            Box::new(crate::cost_estimator::estimate),
        );
        registry.register(
            "cloud.ops",
            crate::cloud_ops::schema(),
            Box::new(crate::cloud_ops::execute),
        );
        registry.register("fs.write", crate::fs_io::schema(), Box::new(crate::fs_io::write));
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        schema: Value,
        handler: Handler,
    ) {
        self.tools.push(RegisteredTool {
            name: name.to_string(),
            schema,
            handler,
        });
    }

    /// Entries for `tools/list`: the schema with `name` spliced in.
    pub fn list(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                let mut entry = serde_json::Map::new();
                entry.insert("name".to_string(), Value::String(t.name.clone()));
                if let Value::Object(schema) = &t.schema {
                    for (k, v) in schema {
                        entry.insert(k.clone(), v.clone());
                    }
                }
                Value::Object(entry)
            })
            .collect()
    }

    /// Invoke a tool by name.
    pub fn call(
        &self,
        name: &str,
        args: &Value,
        ctx: &CallCtx,
    ) -> Result<Result<Value, HandlerError>, RegistryError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
        Ok((tool.handler)(args, ctx))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
