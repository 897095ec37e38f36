// envelope.rs — Signature envelope model.
//
// The envelope travels next to the bundle file (conventionally
// `<bundle>.sig`). All binary fields are base64; `created` is ISO-8601
// UTC with a trailing Z.

use serde::{Deserialize, Serialize};

use crate::error::SigningError;

/// The only algorithm the verifier accepts.
pub const ALG_ED25519: &str = "Ed25519";

/// Fingerprint scheme prefix for the signing public key.
pub const FINGERPRINT_PREFIX: &str = "toolgate:v1:";

/// JSON signature envelope for a policy bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub alg: String,
    /// Signing time, ISO-8601 UTC ("...Z"), informational only.
    pub created: String,
    /// Base64 SHA-256 of the payload bytes.
    pub sha256: String,
    /// Base64 Ed25519 signature over the 32-byte digest.
    pub sig: String,
    /// `toolgate:v1:<8-hex>` tag of the signing public key.
    pub pubkey_fingerprint: String,
}

impl Envelope {
    pub fn from_json(text: &str) -> Result<Self, SigningError> {
        serde_json::from_str(text).map_err(|e| SigningError::MalformedEnvelope(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, SigningError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("envelope serializes")
    }
}

/// `toolgate:v1:<first 4 bytes of SHA-256(pubkey), hex>`.
pub fn fingerprint(public_key: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(public_key);
    format!("{}{}", FINGERPRINT_PREFIX, hex::encode(&digest[..4]))
}
