//! # tg-tools
//!
//! The tool registry: a static mapping from tool name to a JSON schema
//! (served verbatim by `tools/list`) and a handler function. Handlers are
//! opaque to the gateway — they receive the raw arguments plus a caller
//! context and either return a JSON result or fail with a message that
//! surfaces as an in-band tool error, never as a transport error.

pub mod cloud_ops;
pub mod cost_estimator;
pub mod fs_io;
pub mod registry;

pub use registry::{CallCtx, HandlerError, RegistryError, ToolRegistry};
