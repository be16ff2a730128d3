/// Request identity resolution
///
/// Turns an inbound bearer credential into an `Identity`. Both entry
/// points share `resolve`; they differ only in what a rejection becomes:
/// `require_identity` fails with `Unauthenticated`, `optional_identity`
/// yields `None` so the request can carry on as a guest.

use std::sync::Arc;

use crate::auth::claims::TokenKind;
use crate::auth::jwt::TokenCodec;
use crate::auth::revocation::RevocationStore;
use crate::error::{AppError, AuthError, Rejection};
use crate::users::{Identity, UserLookup};

/// Owner id recorded for resources created without an identity.
pub const GUEST_OWNER_ID: &str = "guest-demo";

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Identity),
    Rejected(Rejection),
}

pub struct AuthGuard {
    codec: Arc<TokenCodec>,
    revocations: Arc<RevocationStore>,
    users: Arc<dyn UserLookup>,
}

impl AuthGuard {
    pub fn new(
        codec: Arc<TokenCodec>,
        revocations: Arc<RevocationStore>,
        users: Arc<dyn UserLookup>,
    ) -> Self {
        Self {
            codec,
            revocations,
            users,
        }
    }

    /// Resolve a raw bearer credential.
    ///
    /// Only a failing user lookup is an `Err`; every problem with the
    /// credential itself is a `Rejected` resolution.
    pub async fn resolve(&self, credential: Option<&str>) -> Result<Resolution, AppError> {
        let token = match credential.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Ok(Resolution::Rejected(Rejection::MissingCredential)),
        };

        if self.revocations.is_revoked(token) {
            return Ok(Resolution::Rejected(Rejection::Revoked));
        }

        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(e) => return Ok(Resolution::Rejected(e.into())),
        };

        if claims.kind != TokenKind::Access {
            return Ok(Resolution::Rejected(Rejection::WrongKind {
                expected: TokenKind::Access,
                found: claims.kind,
            }));
        }

        let subject = match claims.subject() {
            Some(subject) => subject,
            None => return Ok(Resolution::Rejected(Rejection::MissingSubject)),
        };

        match self.users.find_by_id(subject).await? {
            Some(identity) => Ok(Resolution::Resolved(identity)),
            None => Ok(Resolution::Rejected(Rejection::UnknownSubject(
                subject.to_string(),
            ))),
        }
    }

    pub async fn require_identity(&self, credential: Option<&str>) -> Result<Identity, AppError> {
        match self.resolve(credential).await? {
            Resolution::Resolved(identity) => Ok(identity),
            Resolution::Rejected(reason) => Err(AppError::unauthenticated(reason)),
        }
    }

    pub async fn optional_identity(&self, credential: Option<&str>) -> Option<Identity> {
        match self.resolve(credential).await {
            Ok(Resolution::Resolved(identity)) => Some(identity),
            Ok(Resolution::Rejected(Rejection::MissingCredential)) => None,
            Ok(Resolution::Rejected(reason)) => {
                tracing::debug!(reason = %reason, "Credential rejected, continuing as guest");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Identity lookup failed, continuing as guest");
                None
            }
        }
    }
}

/// Owner id to record for a resource created by `requester`.
pub fn owner_id(requester: Option<&Identity>) -> &str {
    requester.map_or(GUEST_OWNER_ID, |identity| identity.id.as_str())
}

/// Guest-owned resources are open to everyone; anything else only to its owner.
pub fn authorize_owner(requester: Option<&Identity>, owner_id: &str) -> Result<(), AppError> {
    if owner_id == GUEST_OWNER_ID {
        return Ok(());
    }
    match requester {
        Some(identity) if identity.id == owner_id => Ok(()),
        _ => Err(AuthError::Forbidden.into()),
    }
}
