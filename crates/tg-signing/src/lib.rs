//! # tg-signing
//!
//! Ed25519 signing and verification for policy bundles.
//!
//! A bundle ships with a JSON [`Envelope`] carrying the algorithm, the
//! base64 SHA-256 of the payload, and the base64 signature. The signed
//! message is the 32-byte digest itself — not the payload and not an
//! ASCII rendering of it. There is no trust-on-first-use: callers always
//! supply the public key they expect the bundle to be signed with.

pub mod envelope;
pub mod error;
pub mod sign;
pub mod verify;

pub use envelope::Envelope;
pub use error::SigningError;
pub use sign::{generate_keypair, sign_payload, Keypair};
pub use verify::{verify_bundle, verify_payload};
