/// Authentication module
///
/// Password hashing, token encoding and issuance, revocation, and the
/// guard that resolves a request's bearer credential into an identity.

mod claims;
mod guard;
mod issuer;
mod jwt;
mod password;
mod refresh;
mod revocation;

pub use claims::{Claims, TokenKind};
pub use guard::{authorize_owner, owner_id, AuthGuard, Resolution, GUEST_OWNER_ID};
pub use issuer::{TokenIssuer, TokenPair};
pub use jwt::{TokenCodec, TokenError};
pub use password::CredentialHasher;
pub use refresh::RefreshExchange;
pub use revocation::RevocationStore;
