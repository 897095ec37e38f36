// sign.rs — Bundle signing (used by the CLI and the test suite).
//
// Private keys are stored as base64 PKCS#8 v2 documents, public keys as
// base64 raw 32-byte Ed25519 points. The signed message is the SHA-256
// digest of the payload.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chrono::{SecondsFormat, Utc};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair as _};
use sha2::{Digest, Sha256};

use crate::envelope::{fingerprint, Envelope, ALG_ED25519};
use crate::error::SigningError;

/// A freshly generated or loaded Ed25519 keypair.
pub struct Keypair {
    key: Ed25519KeyPair,
    /// Base64 PKCS#8 document (present only for generated keys).
    pub private_b64: String,
    /// Base64 raw public key bytes.
    pub public_b64: String,
}

/// Generate a new Ed25519 keypair.
pub fn generate_keypair() -> Result<Keypair, SigningError> {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|_| SigningError::Key("keypair generation failed".to_string()))?;
    let key = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
        .map_err(|_| SigningError::Key("generated key failed to parse".to_string()))?;
    let public_b64 = B64.encode(key.public_key().as_ref());
    Ok(Keypair {
        private_b64: B64.encode(pkcs8.as_ref()),
        public_b64,
        key,
    })
}

/// Load a keypair from a base64 PKCS#8 private key string.
pub fn load_keypair(private_b64: &str) -> Result<Keypair, SigningError> {
    let pkcs8 = B64
        .decode(private_b64.trim())
        .map_err(|e| SigningError::Key(format!("invalid private key base64: {e}")))?;
    let key = Ed25519KeyPair::from_pkcs8(&pkcs8)
        .map_err(|_| SigningError::Key("invalid PKCS#8 Ed25519 key".to_string()))?;
    let public_b64 = B64.encode(key.public_key().as_ref());
    Ok(Keypair {
        private_b64: private_b64.trim().to_string(),
        public_b64,
        key,
    })
}

/// Sign a payload, producing the envelope to store alongside it.
pub fn sign_payload(keypair: &Keypair, payload: &[u8]) -> Envelope {
    let digest = Sha256::digest(payload);
    let sig = keypair.key.sign(&digest);
    Envelope {
        alg: ALG_ED25519.to_string(),
        created: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        sha256: B64.encode(digest),
        sig: B64.encode(sig.as_ref()),
        pubkey_fingerprint: fingerprint(keypair.key.public_key().as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::verify_payload;

    #[test]
    fn sign_then_verify_round_trip() {
        let kp = generate_keypair().unwrap();
        let envelope = sign_payload(&kp, b"defaults:\n  decision: deny\n");
        verify_payload(b"defaults:\n  decision: deny\n", &envelope, &kp.public_b64).unwrap();
    }

    #[test]
    fn keypair_reloads_from_private_b64() {
        let kp = generate_keypair().unwrap();
        let reloaded = load_keypair(&kp.private_b64).unwrap();
        assert_eq!(reloaded.public_b64, kp.public_b64);

        let envelope = sign_payload(&reloaded, b"payload");
        verify_payload(b"payload", &envelope, &kp.public_b64).unwrap();
    }

    #[test]
    fn envelope_created_is_utc_with_z() {
        let kp = generate_keypair().unwrap();
        let envelope = sign_payload(&kp, b"x");
        assert!(envelope.created.ends_with('Z'));
    }
}
