/// Authentication Routes
///
/// Registration, login, token refresh, logout and the current-identity
/// endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{owner_id, CredentialHasher, RefreshExchange, RevocationStore, TokenIssuer};
use crate::error::{AppError, AuthError, ErrorContext, Rejection, ValidationError};
use crate::middleware::bearer_token;
use crate::users::{Identity, NewUser, UserStore};
use crate::validators::{is_valid_email, is_valid_name, is_valid_password};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// `None` on refresh: the presented refresh token stays valid
    pub refresh_token: Option<String>,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl AuthResponse {
    fn new(access_token: String, refresh_token: Option<String>, issuer: &TokenIssuer) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer",
            expires_in: issuer.access_ttl().num_seconds(),
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub created_at: String,
    pub preferences: serde_json::Value,
}

impl From<&Identity> for UserResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            created_at: identity.created_at.to_rfc3339(),
            preferences: identity.preferences.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct WhoAmIResponse {
    pub authenticated: bool,
    pub owner_id: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /api/v1/auth/register
///
/// # Errors
/// - 400: invalid email, name or password, or email already registered
/// - 409: lost a registration race for the same email
/// - 429: throttled
pub async fn register(
    form: web::Json<RegisterRequest>,
    users: web::Data<dyn UserStore>,
    issuer: web::Data<TokenIssuer>,
    hasher: web::Data<CredentialHasher>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(form.name.as_deref())?;
    is_valid_password(&form.password)?;

    if users.find_by_email(&email).await?.is_some() {
        return Err(ValidationError::AlreadyRegistered.into());
    }

    let hasher = *hasher.get_ref();
    let password = form.into_inner().password;
    let password_hash = web::block(move || hasher.hash(&password)).await??;

    let identity = users
        .create(NewUser {
            email,
            name,
            password_hash,
        })
        .await?;
    let pair = issuer.issue_pair(&identity.id)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %identity.id,
        "User registered"
    );

    Ok(HttpResponse::Created().json(AuthResponse::new(
        pair.access_token,
        Some(pair.refresh_token),
        &issuer,
    )))
}

/// POST /api/v1/auth/login
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    form: web::Json<LoginRequest>,
    users: web::Data<dyn UserStore>,
    issuer: web::Data<TokenIssuer>,
    hasher: web::Data<CredentialHasher>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = is_valid_email(&form.email)?;
    let stored = users
        .find_credentials(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let hasher = *hasher.get_ref();
    let password = form.into_inner().password;
    let password_hash = stored.password_hash;
    let valid = web::block(move || hasher.verify(&password, &password_hash)).await?;
    if !valid {
        return Err(AuthError::InvalidCredentials.into());
    }

    let identity = stored.identity;
    let pair = issuer.issue_pair(&identity.id)?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %identity.id,
        "User logged in"
    );

    Ok(HttpResponse::Ok().json(AuthResponse::new(
        pair.access_token,
        Some(pair.refresh_token),
        &issuer,
    )))
}

/// POST /api/v1/auth/refresh
///
/// Issues a new access token only. The refresh token is not rotated.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    exchange: web::Data<RefreshExchange>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, AppError> {
    let access_token = exchange.exchange(&form.refresh_token).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::new(access_token, None, &issuer)))
}

/// POST /api/v1/auth/logout
///
/// Revokes the presented bearer token as is. It is not validated first, so
/// logging out with an already expired or foreign token still succeeds.
/// Throttled per client like the other anonymous auth routes.
pub async fn logout(
    req: HttpRequest,
    revocations: web::Data<RevocationStore>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::unauthenticated(Rejection::MissingCredential))?;

    revocations.revoke(&token, issuer.codec(), issuer.access_ttl());
    tracing::info!(revoked = revocations.len(), "User logged out");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Successfully logged out",
    }))
}

/// GET /api/v1/auth/me
pub async fn get_current_user(identity: web::ReqData<Identity>) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(&*identity))
}

/// GET /api/v1/auth/whoami
///
/// Never fails: without a usable credential the caller is the shared guest.
pub async fn whoami(identity: Option<web::ReqData<Identity>>) -> HttpResponse {
    let identity = identity.as_deref();
    HttpResponse::Ok().json(WhoAmIResponse {
        authenticated: identity.is_some(),
        owner_id: owner_id(identity).to_string(),
    })
}
