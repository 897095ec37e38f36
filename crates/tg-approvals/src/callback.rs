// callback.rs — Signature verification for approval callbacks.
//
// Two schemes share the same shape: a freshness window on a caller-
// supplied timestamp, an HMAC-SHA256 over a scheme-specific message, and
// a constant-time compare against the presented signature.
//
//   webhook:    v0=hex( HMAC(secret, "v0:<ts>:<raw body>") )
//   signed URL: urlsafe_b64( HMAC(secret, "<ts>:<pending_id>:<decision>") )

use base64::engine::general_purpose::URL_SAFE as B64_URL;
use base64::Engine as _;
use chrono::Utc;
use ring::hmac;
use subtle::ConstantTimeEq as _;
use thiserror::Error;

/// Freshness window for both schemes: five minutes.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Typed callback verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackError {
    /// Timestamp is outside the tolerance window (replay or clock skew).
    #[error("stale request")]
    StaleRequest,

    /// Signature did not match.
    #[error("invalid signature")]
    BadSignature,

    /// Timestamp is not an integer.
    #[error("invalid timestamp")]
    BadTimestamp,

    /// No signing secret configured for this scheme.
    #[error("signing secret not configured")]
    NotConfigured,
}

fn check_freshness(ts: &str, now: i64, tolerance: i64) -> Result<i64, CallbackError> {
    let ts: i64 = ts.trim().parse().map_err(|_| CallbackError::BadTimestamp)?;
    if (now - ts).abs() > tolerance {
        return Err(CallbackError::StaleRequest);
    }
    Ok(ts)
}

fn mac_hex(secret: &str, message: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hex::encode(hmac::sign(&key, message).as_ref())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).unwrap_u8() == 1
}

/// Verify a chat-webhook callback (`X-Request-Timestamp` +
/// `X-Request-Signature: v0=<hex>` over the raw body).
pub fn verify_webhook(
    secret: &str,
    ts: &str,
    signature: &str,
    body: &[u8],
    tolerance: i64,
) -> Result<(), CallbackError> {
    verify_webhook_at(secret, ts, signature, body, tolerance, Utc::now().timestamp())
}

/// As [`verify_webhook`], with an explicit clock for tests.
pub fn verify_webhook_at(
    secret: &str,
    ts: &str,
    signature: &str,
    body: &[u8],
    tolerance: i64,
    now: i64,
) -> Result<(), CallbackError> {
    if secret.is_empty() {
        return Err(CallbackError::NotConfigured);
    }
    check_freshness(ts, now, tolerance)?;

    let mut message = Vec::with_capacity(body.len() + ts.len() + 4);
    message.extend_from_slice(b"v0:");
    message.extend_from_slice(ts.as_bytes());
    message.push(b':');
    message.extend_from_slice(body);

    let expected = format!("v0={}", mac_hex(secret, &message));
    if constant_time_eq(&expected, signature) {
        Ok(())
    } else {
        Err(CallbackError::BadSignature)
    }
}

/// Compute the webhook signature header for a body (test/tooling helper).
pub fn webhook_signature(secret: &str, ts: &str, body: &[u8]) -> String {
    let mut message = Vec::with_capacity(body.len() + ts.len() + 4);
    message.extend_from_slice(b"v0:");
    message.extend_from_slice(ts.as_bytes());
    message.push(b':');
    message.extend_from_slice(body);
    format!("v0={}", mac_hex(secret, &message))
}

/// Verify a signed-URL approval (`?pending_id=&decision=&ts=&sig=`).
pub fn verify_signed_url(
    secret: &str,
    pending_id: &str,
    decision: &str,
    ts: &str,
    signature: &str,
    tolerance: i64,
) -> Result<(), CallbackError> {
    verify_signed_url_at(
        secret,
        pending_id,
        decision,
        ts,
        signature,
        tolerance,
        Utc::now().timestamp(),
    )
}

/// As [`verify_signed_url`], with an explicit clock for tests.
pub fn verify_signed_url_at(
    secret: &str,
    pending_id: &str,
    decision: &str,
    ts: &str,
    signature: &str,
    tolerance: i64,
    now: i64,
) -> Result<(), CallbackError> {
    if secret.is_empty() {
        return Err(CallbackError::NotConfigured);
    }
    check_freshness(ts, now, tolerance)?;

    let expected = url_signature(secret, pending_id, decision, ts);
    if constant_time_eq(&expected, signature) {
        Ok(())
    } else {
        Err(CallbackError::BadSignature)
    }
}

/// Compute the signed-URL signature (used when minting approval links).
pub fn url_signature(secret: &str, pending_id: &str, decision: &str, ts: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let message = format!("{ts}:{pending_id}:{decision}");
    B64_URL.encode(hmac::sign(&key, message.as_bytes()).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";
    const NOW: i64 = 1_750_000_000;

    #[test]
    fn webhook_accepts_fresh_valid_signature() {
        let ts = NOW.to_string();
        let body = b"payload=%7B%7D";
        let sig = webhook_signature(SECRET, &ts, body);
        verify_webhook_at(SECRET, &ts, &sig, body, DEFAULT_TOLERANCE_SECS, NOW).unwrap();
    }

    #[test]
    fn webhook_rejects_replay_past_tolerance() {
        // Valid MAC, 400 s old: rejected as stale even though HMAC matches.
        let ts = (NOW - 400).to_string();
        let body = b"payload=%7B%7D";
        let sig = webhook_signature(SECRET, &ts, body);
        assert_eq!(
            verify_webhook_at(SECRET, &ts, &sig, body, DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::StaleRequest)
        );
    }

    #[test]
    fn webhook_rejects_future_timestamps() {
        let ts = (NOW + 400).to_string();
        let sig = webhook_signature(SECRET, &ts, b"x");
        assert_eq!(
            verify_webhook_at(SECRET, &ts, &sig, b"x", DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::StaleRequest)
        );
    }

    #[test]
    fn webhook_rejects_tampered_body() {
        let ts = NOW.to_string();
        let sig = webhook_signature(SECRET, &ts, b"original");
        assert_eq!(
            verify_webhook_at(SECRET, &ts, &sig, b"tampered", DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::BadSignature)
        );
    }

    #[test]
    fn webhook_rejects_bad_timestamp() {
        assert_eq!(
            verify_webhook_at(SECRET, "not-a-number", "v0=00", b"x", DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::BadTimestamp)
        );
    }

    #[test]
    fn webhook_requires_configured_secret() {
        assert_eq!(
            verify_webhook_at("", &NOW.to_string(), "v0=00", b"x", DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::NotConfigured)
        );
    }

    #[test]
    fn signed_url_round_trip() {
        let ts = NOW.to_string();
        let sig = url_signature(SECRET, "abc123", "approve", &ts);
        verify_signed_url_at(SECRET, "abc123", "approve", &ts, &sig, DEFAULT_TOLERANCE_SECS, NOW)
            .unwrap();
    }

    #[test]
    fn signed_url_binds_decision() {
        // A signature minted for "approve" must not authorize "deny".
        let ts = NOW.to_string();
        let sig = url_signature(SECRET, "abc123", "approve", &ts);
        assert_eq!(
            verify_signed_url_at(SECRET, "abc123", "deny", &ts, &sig, DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::BadSignature)
        );
    }

    #[test]
    fn signed_url_binds_pending_id() {
        let ts = NOW.to_string();
        let sig = url_signature(SECRET, "abc123", "approve", &ts);
        assert_eq!(
            verify_signed_url_at(SECRET, "other", "approve", &ts, &sig, DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::BadSignature)
        );
    }

    #[test]
    fn signed_url_rejects_stale() {
        let ts = (NOW - 301).to_string();
        let sig = url_signature(SECRET, "abc123", "approve", &ts);
        assert_eq!(
            verify_signed_url_at(SECRET, "abc123", "approve", &ts, &sig, DEFAULT_TOLERANCE_SECS, NOW),
            Err(CallbackError::StaleRequest)
        );
    }
}
