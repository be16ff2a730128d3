/// Access and refresh token issuance.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::auth::claims::{Claims, TokenKind};
use crate::auth::jwt::TokenCodec;
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Both tokens handed out at registration and login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            codec,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_settings(codec: Arc<TokenCodec>, settings: &JwtSettings) -> Self {
        Self::new(codec, settings.access_ttl(), settings.refresh_ttl())
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue_access(&self, subject_id: &str) -> Result<String, AppError> {
        self.issue(subject_id, TokenKind::Access, self.access_ttl)
    }

    pub fn issue_refresh(&self, subject_id: &str) -> Result<String, AppError> {
        self.issue(subject_id, TokenKind::Refresh, self.refresh_ttl)
    }

    pub fn issue_pair(&self, subject_id: &str) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject_id)?,
            refresh_token: self.issue_refresh(subject_id)?,
        })
    }

    fn issue(&self, subject_id: &str, kind: TokenKind, ttl: Duration) -> Result<String, AppError> {
        let claims = Claims::new(
            subject_id,
            kind,
            Utc::now().timestamp(),
            ttl,
            self.codec.issuer(),
        );

        self.codec
            .encode(&claims)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        let codec = TokenCodec::new("test-secret-key-at-least-32-characters-long", "test").unwrap();
        TokenIssuer::new(Arc::new(codec), Duration::minutes(30), Duration::days(7))
    }

    #[test]
    fn test_access_token_claims() {
        let issuer = issuer();
        let before = Utc::now().timestamp();
        let token = issuer.issue_access("u1").unwrap();
        let claims = issuer.codec().decode(&token).unwrap();

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.iss, "test");
        assert!(claims.exp >= before + 30 * 60);
        assert!(claims.exp <= Utc::now().timestamp() + 30 * 60);
    }

    #[test]
    fn test_refresh_token_claims() {
        let issuer = issuer();
        let token = issuer.issue_refresh("u1").unwrap();
        let claims = issuer.codec().decode(&token).unwrap();

        assert_eq!(claims.kind, TokenKind::Refresh);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_pair_contains_one_of_each_kind() {
        let issuer = issuer();
        let pair = issuer.issue_pair("u1").unwrap();

        assert_ne!(pair.access_token, pair.refresh_token);
        let access = issuer.codec().decode(&pair.access_token).unwrap();
        let refresh = issuer.codec().decode(&pair.refresh_token).unwrap();
        assert_eq!(access.kind, TokenKind::Access);
        assert_eq!(refresh.kind, TokenKind::Refresh);
    }

    #[test]
    fn test_tokens_minted_back_to_back_differ() {
        let issuer = issuer();
        let a = issuer.issue_access("u1").unwrap();
        let b = issuer.issue_access("u1").unwrap();

        assert_ne!(a, b);
    }
}
