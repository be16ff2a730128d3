/// Bearer Authentication Middleware
///
/// Resolves the request's bearer credential through the `AuthGuard` and
/// injects the resulting `Identity` into request extensions. Handlers read
/// it with `web::ReqData<Identity>` (required) or
/// `Option<web::ReqData<Identity>>` (optional).

use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderMap},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::AuthGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Required,
    Optional,
}

/// Extract the credential from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. Any other scheme, a missing
/// header, or an empty credential all yield `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credential) = value.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let credential = credential.trim();
    if credential.is_empty() {
        None
    } else {
        Some(credential.to_string())
    }
}

pub struct JwtMiddleware {
    guard: Arc<AuthGuard>,
    mode: Mode,
}

impl JwtMiddleware {
    /// Reject the request with 401 unless an identity resolves.
    pub fn required(guard: Arc<AuthGuard>) -> Self {
        Self {
            guard,
            mode: Mode::Required,
        }
    }

    /// Let the request through as a guest when no identity resolves.
    pub fn optional(guard: Arc<AuthGuard>) -> Self {
        Self {
            guard,
            mode: Mode::Optional,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            guard: self.guard.clone(),
            mode: self.mode,
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    guard: Arc<AuthGuard>,
    mode: Mode,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let credential = bearer_token(req.headers());
        let service = self.service.clone();
        let guard = self.guard.clone();
        let mode = self.mode;

        Box::pin(async move {
            let identity = match mode {
                Mode::Required => match guard.require_identity(credential.as_deref()).await {
                    Ok(identity) => Some(identity),
                    Err(e) => return Ok(req.error_response(e).map_into_right_body()),
                },
                Mode::Optional => guard.optional_identity(credential.as_deref()).await,
            };

            if let Some(identity) = identity {
                tracing::debug!(user_id = %identity.id, "Identity resolved");
                req.extensions_mut().insert(identity);
            }

            service
                .call(req)
                .await
                .map(ServiceResponse::map_into_left_body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).as_deref(), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")).as_deref(), Some("abc"));
        assert_eq!(bearer_token(&headers("BEARER   abc  ")).as_deref(), Some("abc"));
    }

    #[test]
    fn test_no_credential() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        for value in ["Bearer", "Bearer ", "Basic dXNlcjpwYXNz", "abc.def.ghi", "Token abc"] {
            assert_eq!(bearer_token(&headers(value)), None, "{}", value);
        }
    }
}
