/// JWT Claims structure
///
/// The payload signed into every token. Claims are integrity-protected
/// but readable by anyone holding the token, so nothing secret goes here.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

const RESERVED_CLAIMS: [&str; 6] = ["sub", "type", "exp", "iat", "iss", "jti"];

/// Discriminates the two token kinds. Serialized as the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (identity id)
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique per token, so two tokens minted in the same second differ
    pub jti: String,
    /// Caller-supplied extra claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Build claims for `subject` that expire `ttl` after `issued_at`.
    pub fn new(
        subject: &str,
        kind: TokenKind,
        issued_at: i64,
        ttl: Duration,
        issuer: &str,
    ) -> Self {
        Self {
            sub: subject.to_string(),
            kind,
            exp: issued_at + ttl.num_seconds(),
            iat: issued_at,
            iss: issuer.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            extra: Map::new(),
        }
    }

    /// Attach an extra claim. Registered claim names are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !RESERVED_CLAIMS.contains(&key.as_str()) {
            self.extra.insert(key, value);
        }
        self
    }

    /// A token is expired at its `exp` second, not after it.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }

    pub fn subject(&self) -> Option<&str> {
        let sub = self.sub.trim();
        if sub.is_empty() {
            None
        } else {
            Some(sub)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let claims = Claims::new("u1", TokenKind::Access, 1_000, Duration::minutes(30), "test");

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.kind, TokenKind::Access);
        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_000 + 1_800);
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_expiry_boundary() {
        let claims = Claims::new("u1", TokenKind::Access, 1_000, Duration::seconds(10), "test");

        assert!(!claims.is_expired_at(1_009));
        assert!(claims.is_expired_at(1_010));
        assert!(claims.is_expired_at(1_011));
    }

    #[test]
    fn test_kind_serializes_as_type_claim() {
        let claims = Claims::new("u1", TokenKind::Refresh, 0, Duration::days(7), "test")
            .with_extra("device", Value::String("phone".to_string()));
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["type"], "refresh");
        assert_eq!(json["device"], "phone");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_extra_cannot_override_registered_claims() {
        let claims = Claims::new("u1", TokenKind::Access, 0, Duration::minutes(1), "test")
            .with_extra("type", Value::String("refresh".to_string()))
            .with_extra("sub", Value::String("admin".to_string()));

        assert!(claims.extra.is_empty());
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["type"], "access");
        assert_eq!(json["sub"], "u1");
    }

    #[test]
    fn test_blank_subject() {
        let mut claims = Claims::new("u1", TokenKind::Access, 0, Duration::minutes(1), "test");
        claims.sub = "  ".to_string();

        assert_eq!(claims.subject(), None);
    }

    #[test]
    fn test_unique_token_ids() {
        let a = Claims::new("u1", TokenKind::Access, 0, Duration::minutes(1), "test");
        let b = Claims::new("u1", TokenKind::Access, 0, Duration::minutes(1), "test");

        assert_ne!(a.jti, b.jti);
    }
}
