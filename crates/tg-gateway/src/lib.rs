//! # tg-gateway
//!
//! The gateway itself: JSON-RPC 2.0 dispatch over HTTP and stdio, chat
//! and signed-URL approval callbacks, and the RBAC-guarded admin API.
//!
//! A tool call flows: authenticate → resolve the tenant's engine →
//! evaluate policy → deny / create-approval / execute → audit → reply.
//! Every terminal outcome writes an audit entry before the reply goes
//! out; audit failures are logged, never surfaced to the caller.

pub mod config;
pub mod error;
pub mod http;
pub mod rpc;
pub mod state;
pub mod stdio;

pub use config::Settings;
pub use error::GatewayError;
pub use state::Gateway;
