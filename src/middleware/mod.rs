/// Middleware module
///
/// Bearer identity resolution and per-route throttling.

mod jwt_middleware;
mod rate_limit;

pub use jwt_middleware::{bearer_token, JwtMiddleware};
pub use rate_limit::RateLimit;
