/// JWT Token Encoding and Verification
///
/// HS256-signed compact tokens keyed by a server-held secret. The codec
/// checks signature, issuer and expiry; it knows nothing about token
/// kinds or revocation.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::fmt;
use thiserror::Error;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::ConfigError;

const MIN_RECOMMENDED_SECRET_LEN: usize = 32;

/// Token encoding and verification errors
///
/// These stay distinct for logging; callers collapse them before
/// anything reaches a client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("secret", &"[redacted]")
            .finish()
    }
}

impl TokenCodec {
    /// Build a codec for `secret`. An empty secret is refused.
    pub fn new(secret: &str, issuer: &str) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if secret.len() < MIN_RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                length = secret.len(),
                "JWT secret is shorter than {} bytes",
                MIN_RECOMMENDED_SECRET_LEN
            );
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        // Expiry is checked in `decode_at` so that exp == now counts as expired.
        validation.validate_exp = false;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
        })
    }

    pub fn from_settings(settings: &JwtSettings) -> Result<Self, ConfigError> {
        Self::new(&settings.secret, &settings.issuer)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify `token` against the current time.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify `token` as of the Unix timestamp `now`.
    pub fn decode_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::TokenKind;
    use chrono::{Duration, Utc};

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, "test").unwrap()
    }

    fn claims_for(subject: &str, kind: TokenKind) -> Claims {
        Claims::new(subject, kind, Utc::now().timestamp(), Duration::minutes(30), "test")
    }

    #[test]
    fn test_round_trip_preserves_subject_and_kind() {
        let codec = codec();
        for subject in ["u1", "5f0c2a1e-8d4b-4f55-9b1a-2d6f1c0e7a11", "ünïcødé"] {
            for kind in [TokenKind::Access, TokenKind::Refresh] {
                let token = codec.encode(&claims_for(subject, kind)).unwrap();
                let decoded = codec.decode(&token).unwrap();
                assert_eq!(decoded.sub, subject);
                assert_eq!(decoded.kind, kind);
            }
        }
    }

    #[test]
    fn test_extra_claims_survive() {
        let codec = codec();
        let claims = claims_for("u1", TokenKind::Access)
            .with_extra("scope", serde_json::json!(["pantry:read"]));
        let decoded = codec.decode(&codec.encode(&claims).unwrap()).unwrap();

        assert_eq!(decoded.extra["scope"], serde_json::json!(["pantry:read"]));
    }

    #[test]
    fn test_invalid_token() {
        let result = codec().decode("invalid.token.here");
        assert!(matches!(result, Err(TokenError::Malformed(_))));

        let result = codec().decode("not-a-jwt");
        assert!(matches!(result, Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_tampered_token() {
        let codec = codec();
        let token = codec.encode(&claims_for("u1", TokenKind::Access)).unwrap();

        let tampered = format!("{}X", token);
        assert!(codec.decode(&tampered).is_err());

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = codec
            .encode(&claims_for("admin", TokenKind::Access))
            .unwrap();
        let forged_payload = forged_payload.split('.').nth(1).unwrap().to_string();
        parts[1] = forged_payload.as_str();
        let spliced = parts.join(".");
        assert_eq!(codec.decode(&spliced), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenCodec::new("a-completely-different-secret-value", "test").unwrap();
        let token = other.encode(&claims_for("u1", TokenKind::Access)).unwrap();

        assert_eq!(codec().decode(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_wrong_issuer() {
        let other = TokenCodec::new(SECRET, "someone-else").unwrap();
        let mut claims = claims_for("u1", TokenKind::Access);
        claims.iss = "someone-else".to_string();
        let token = other.encode(&claims).unwrap();

        assert!(matches!(codec().decode(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_expired_token() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = Claims::new("u1", TokenKind::Access, now - 7200, Duration::hours(1), "test");
        let token = codec.encode(&claims).unwrap();

        assert_eq!(codec.decode(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_expiry_equal_to_now_is_expired() {
        let codec = codec();
        let claims = Claims::new("u1", TokenKind::Access, 10_000, Duration::seconds(60), "test");
        let token = codec.encode(&claims).unwrap();

        assert!(codec.decode_at(&token, 10_059).is_ok());
        assert_eq!(codec.decode_at(&token, 10_060), Err(TokenError::Expired));
    }

    #[test]
    fn test_missing_kind_claim_is_malformed() {
        let payload = serde_json::json!({
            "sub": "u1",
            "exp": Utc::now().timestamp() + 600,
            "iat": Utc::now().timestamp(),
            "iss": "test",
            "jti": "x",
        });
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(codec().decode(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_empty_secret_refused() {
        assert_eq!(
            TokenCodec::new("", "test").unwrap_err(),
            ConfigError::MissingRequired("jwt.secret".to_string())
        );
        assert!(TokenCodec::new("   ", "test").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains(SECRET));
    }
}
