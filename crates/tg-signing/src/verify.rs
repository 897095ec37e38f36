// verify.rs — Bundle verification.
//
// Order of checks: algorithm, digest (constant-time), signature. The
// digest compare runs before the signature so a corrupted file is
// reported as digest_mismatch rather than bad_signature.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use ring::signature::{UnparsedPublicKey, ED25519};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq as _;

use crate::envelope::{Envelope, ALG_ED25519};
use crate::error::SigningError;

/// Verify payload bytes against an envelope and an expected public key
/// (base64 raw 32 bytes). The signed message is the 32-byte digest.
pub fn verify_payload(
    payload: &[u8],
    envelope: &Envelope,
    public_key_b64: &str,
) -> Result<(), SigningError> {
    if envelope.alg != ALG_ED25519 {
        return Err(SigningError::BadAlgorithm(envelope.alg.clone()));
    }

    let claimed = B64
        .decode(&envelope.sha256)
        .map_err(|e| SigningError::MalformedEnvelope(format!("sha256 field: {e}")))?;
    let actual = Sha256::digest(payload);
    if claimed.len() != actual.len() || claimed.ct_eq(actual.as_slice()).unwrap_u8() != 1 {
        return Err(SigningError::DigestMismatch);
    }

    let sig = B64
        .decode(&envelope.sig)
        .map_err(|e| SigningError::MalformedEnvelope(format!("sig field: {e}")))?;
    let public_key = B64
        .decode(public_key_b64.trim())
        .map_err(|e| SigningError::MalformedEnvelope(format!("public key: {e}")))?;

    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(&actual, &sig)
        .map_err(|_| SigningError::BadSignature)
}

/// Verify a bundle file against its envelope file.
pub fn verify_bundle(
    payload_path: impl AsRef<std::path::Path>,
    envelope_path: impl AsRef<std::path::Path>,
    public_key_b64: &str,
) -> Result<(), SigningError> {
    let payload = std::fs::read(payload_path)?;
    let envelope = Envelope::from_file(envelope_path)?;
    verify_payload(&payload, &envelope, public_key_b64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sign::{generate_keypair, sign_payload};

    #[test]
    fn rejects_wrong_algorithm() {
        let kp = generate_keypair().unwrap();
        let mut envelope = sign_payload(&kp, b"payload");
        envelope.alg = "RSA".to_string();
        assert!(matches!(
            verify_payload(b"payload", &envelope, &kp.public_b64),
            Err(SigningError::BadAlgorithm(_))
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let kp = generate_keypair().unwrap();
        let envelope = sign_payload(&kp, b"payload");
        assert!(matches!(
            verify_payload(b"payload-tampered", &envelope, &kp.public_b64),
            Err(SigningError::DigestMismatch)
        ));
    }

    #[test]
    fn rejects_wrong_key() {
        let signer = generate_keypair().unwrap();
        let other = generate_keypair().unwrap();
        let envelope = sign_payload(&signer, b"payload");
        assert!(matches!(
            verify_payload(b"payload", &envelope, &other.public_b64),
            Err(SigningError::BadSignature)
        ));
    }

    #[test]
    fn rejects_swapped_signature() {
        let kp = generate_keypair().unwrap();
        let envelope_a = sign_payload(&kp, b"payload-a");
        let mut envelope_b = sign_payload(&kp, b"payload-b");
        // Digest of b, signature of a: digest check passes, signature fails.
        envelope_b.sig = envelope_a.sig;
        assert!(matches!(
            verify_payload(b"payload-b", &envelope_b, &kp.public_b64),
            Err(SigningError::BadSignature)
        ));
    }

    #[test]
    fn verifies_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let payload_path = dir.path().join("bundle.yaml");
        let sig_path = dir.path().join("bundle.yaml.sig");

        let kp = generate_keypair().unwrap();
        std::fs::write(&payload_path, b"defaults:\n  decision: deny\n").unwrap();
        let envelope = sign_payload(&kp, b"defaults:\n  decision: deny\n");
        std::fs::write(&sig_path, envelope.to_json()).unwrap();

        verify_bundle(&payload_path, &sig_path, &kp.public_b64).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let kp = generate_keypair().unwrap();
        assert!(matches!(
            verify_bundle("/nonexistent/bundle.yaml", "/nonexistent/bundle.yaml.sig", &kp.public_b64),
            Err(SigningError::Io(_))
        ));
    }
}
