//! # tg-auth
//!
//! Authentication and authorization for the gateway's HTTP surfaces.
//!
//! [`TokenVerifier`] validates `Bearer` tokens: RS256 against a JWKS
//! document when an issuer is configured, falling back to a shared-secret
//! HS256 path for development. [`rbac`] holds the role bindings
//! (`rbac:<tenant>:<subject>` in the KV store) and the admin/viewer
//! guards used by the management endpoints.

pub mod claims;
pub mod error;
pub mod rbac;
pub mod token;

pub use claims::Claims;
pub use error::AuthError;
pub use rbac::{require_admin, require_viewer, RoleStore};
pub use token::{TokenConfig, TokenVerifier};
