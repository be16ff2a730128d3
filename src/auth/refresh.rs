/// Refresh token exchange.
///
/// A valid refresh token buys a new access token. The refresh token itself
/// is not rotated and stays usable until it expires.

use std::sync::Arc;

use crate::auth::claims::TokenKind;
use crate::auth::issuer::TokenIssuer;
use crate::error::{AppError, Rejection};
use crate::users::UserLookup;

pub struct RefreshExchange {
    issuer: Arc<TokenIssuer>,
    users: Arc<dyn UserLookup>,
}

impl RefreshExchange {
    pub fn new(issuer: Arc<TokenIssuer>, users: Arc<dyn UserLookup>) -> Self {
        Self { issuer, users }
    }

    /// Exchange `refresh_token` for a fresh access token.
    ///
    /// # Errors
    /// `InvalidToken` when the token fails to decode, is not a refresh token,
    /// or names a user that no longer exists. Lookup failures propagate as is.
    pub async fn exchange(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self
            .issuer
            .codec()
            .decode(refresh_token)
            .map_err(|e| AppError::invalid_token(e.into()))?;

        if claims.kind != TokenKind::Refresh {
            return Err(AppError::invalid_token(Rejection::WrongKind {
                expected: TokenKind::Refresh,
                found: claims.kind,
            }));
        }

        let subject = claims
            .subject()
            .ok_or_else(|| AppError::invalid_token(Rejection::MissingSubject))?;

        let identity = self
            .users
            .find_by_id(subject)
            .await?
            .ok_or_else(|| AppError::invalid_token(Rejection::UnknownSubject(subject.to_string())))?;

        tracing::debug!(user_id = %identity.id, "Refresh token exchanged");
        self.issuer.issue_access(&identity.id)
    }
}
