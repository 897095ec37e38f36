// token.rs — Bearer token verification.
//
// Resolution order: when an issuer + JWKS URL are configured, try RS256
// with the JWKS key whose kid matches the token header; on any failure
// (or with no OIDC config) fall back to the dev HS256 shared secret.
// Audience, issuer, and expiry are checked on both paths.
//
// The JWKS cache is single-slot: fetched once on first use and kept for
// the process lifetime. Key rotation therefore needs a restart, which is
// acceptable for the fallback-capable setups this targets.

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::claims::Claims;
use crate::error::AuthError;

/// Token verification settings.
#[derive(Debug, Clone, Default)]
pub struct TokenConfig {
    /// OIDC issuer URL; RS256 is attempted only when set with `jwks_url`.
    pub issuer: Option<String>,
    /// Expected audience on both paths.
    pub audience: String,
    /// JWKS document URL.
    pub jwks_url: Option<String>,
    /// Shared secret for the dev HS256 path.
    pub dev_secret: String,
    /// Issuer expected on dev tokens.
    pub dev_issuer: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct JwkSet {
    #[serde(default)]
    keys: Vec<Jwk>,
}

/// Verifies bearer tokens and produces [`Claims`].
pub struct TokenVerifier {
    config: TokenConfig,
    http: reqwest::Client,
    jwks: RwLock<Option<JwkSet>>,
}

impl TokenVerifier {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(5))
                .build()
                .expect("reqwest client builds"),
            jwks: RwLock::new(None),
        }
    }

    /// Verify an `Authorization` header value and extract claims.
    pub async fn verify(&self, authorization: &str) -> Result<Claims, AuthError> {
        let token = authorization
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingBearer)?
            .trim();
        if token.is_empty() {
            return Err(AuthError::MissingBearer);
        }

        if self.config.issuer.is_some() && self.config.jwks_url.is_some() {
            match self.verify_rs256(token).await {
                Ok(claims) => return Ok(claims),
                Err(e) => {
                    tracing::debug!(error = %e, "OIDC verification failed, trying dev path");
                }
            }
        }

        self.verify_dev(token)
    }

    async fn verify_rs256(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Invalid(e.to_string()))?;
        let kid = header.kid.ok_or_else(|| AuthError::Invalid("no kid".into()))?;

        let jwks = self.jwks().await?;
        let key = jwks
            .keys
            .iter()
            .find(|k| k.kid.as_deref() == Some(kid.as_str()))
            .ok_or_else(|| AuthError::Invalid(format!("kid '{kid}' not in JWKS")))?;
        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| AuthError::Invalid(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[self.config.issuer.as_deref().unwrap_or_default()]);

        let data = decode::<Value>(token, &decoding_key, &validation).map_err(map_jwt_error)?;
        Ok(Claims::from_value(&data.claims))
    }

    fn verify_dev(&self, token: &str) -> Result<Claims, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.config.dev_secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.dev_issuer]);

        let data = decode::<Value>(token, &decoding_key, &validation).map_err(map_jwt_error)?;
        Ok(Claims::from_value(&data.claims))
    }

    /// Single-slot JWKS cache; first miss fetches.
    async fn jwks(&self) -> Result<JwkSet, AuthError> {
        if let Some(cached) = self.jwks.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let url = self
            .config
            .jwks_url
            .as_deref()
            .ok_or_else(|| AuthError::Invalid("no JWKS URL".into()))?;
        let fetched: JwkSet = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::Invalid(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AuthError::Invalid(format!("JWKS parse failed: {e}")))?;
        *self.jwks.write().await = Some(fetched.clone());
        Ok(fetched)
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::Invalid(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "dev-secret-for-tests";

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(TokenConfig {
            issuer: None,
            audience: "toolgate".into(),
            jwks_url: None,
            dev_secret: SECRET.into(),
            dev_issuer: "toolgate-dev".into(),
        })
    }

    fn mint(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn exp(offset_secs: i64) -> i64 {
        chrono::Utc::now().timestamp() + offset_secs
    }

    #[tokio::test]
    async fn accepts_valid_dev_token() {
        let token = mint(json!({
            "sub": "alice", "tenant": "acme", "roles": ["admin"],
            "aud": "toolgate", "iss": "toolgate-dev", "exp": exp(600),
        }));
        let claims = verifier().verify(&format!("Bearer {token}")).await.unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.tenant, "acme");
        assert!(claims.has_role("admin"));
    }

    #[tokio::test]
    async fn rejects_missing_header() {
        assert!(matches!(
            verifier().verify("").await,
            Err(AuthError::MissingBearer)
        ));
        assert!(matches!(
            verifier().verify("Basic abc").await,
            Err(AuthError::MissingBearer)
        ));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let token = mint(json!({
            "sub": "alice", "aud": "toolgate", "iss": "toolgate-dev", "exp": exp(-600),
        }));
        assert!(matches!(
            verifier().verify(&format!("Bearer {token}")).await,
            Err(AuthError::Expired)
        ));
    }

    #[tokio::test]
    async fn rejects_wrong_audience() {
        let token = mint(json!({
            "sub": "alice", "aud": "someone-else", "iss": "toolgate-dev", "exp": exp(600),
        }));
        assert!(matches!(
            verifier().verify(&format!("Bearer {token}")).await,
            Err(AuthError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let token = encode(
            &Header::default(),
            &json!({"sub": "x", "aud": "toolgate", "iss": "toolgate-dev", "exp": exp(600)}),
            &EncodingKey::from_secret(b"other-secret"),
        )
        .unwrap();
        assert!(matches!(
            verifier().verify(&format!("Bearer {token}")).await,
            Err(AuthError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_jwks_falls_back_to_dev_secret() {
        let verifier = TokenVerifier::new(TokenConfig {
            issuer: Some("https://issuer.example".into()),
            audience: "toolgate".into(),
            jwks_url: Some("http://127.0.0.1:1/jwks.json".into()),
            dev_secret: SECRET.into(),
            dev_issuer: "toolgate-dev".into(),
        });
        let token = mint(json!({
            "sub": "alice", "aud": "toolgate", "iss": "toolgate-dev", "exp": exp(600),
        }));
        let claims = verifier.verify(&format!("Bearer {token}")).await.unwrap();
        assert_eq!(claims.sub, "alice");
    }
}
