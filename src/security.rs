/// Request throttling and response hardening
///
/// A token bucket per client address, refilled continuously at the
/// configured per-minute rate, the static headers every response gets, and
/// the cross-origin policy.

use actix_cors::Cors;
use actix_web::http::Uri;
use actix_web::middleware::DefaultHeaders;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::error::ConfigError;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: u32,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(requests_per_minute: u32) -> Self {
        Self {
            tokens: requests_per_minute as f64,
            last_refill: Instant::now(),
            capacity: requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
        }
    }

    /// True once the bucket has refilled to capacity, i.e. it holds no state
    /// a fresh bucket would not.
    fn is_full(&self) -> bool {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens + elapsed * self.refill_rate >= self.capacity as f64
    }

    fn try_take_token(&mut self) -> bool {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity as f64);
        self.last_refill = Instant::now();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-client buckets for one throttled route
pub struct RateLimiterManager {
    requests_per_minute: u32,
    limiters: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiterManager {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Take one request from `client`'s bucket.
    pub fn check_rate_limit(&self, client: &str) -> Result<(), String> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        limiters.retain(|_, bucket| !bucket.is_full());

        let limiter = limiters
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute));

        if limiter.try_take_token() {
            Ok(())
        } else {
            Err(format!(
                "Rate limit exceeded: max {} requests per minute",
                self.requests_per_minute
            ))
        }
    }
}

pub struct SecurityHeaders;

impl SecurityHeaders {
    pub fn get_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("X-Content-Type-Options", "nosniff"),
            ("X-Frame-Options", "DENY"),
            ("Referrer-Policy", "strict-origin-when-cross-origin"),
            ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
            ("Content-Security-Policy", "default-src 'none'; frame-ancestors 'none'"),
        ]
    }

    /// Middleware adding all of the above to every response
    pub fn middleware() -> DefaultHeaders {
        Self::get_headers()
            .into_iter()
            .fold(DefaultHeaders::new(), |headers, header| headers.add(header))
    }
}

/// Allowed cross-origin callers: exact origins plus an optional pattern.
/// Credentials are allowed, so wildcards are not.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    origins: Vec<String>,
    origin_regex: Option<Regex>,
}

impl CorsPolicy {
    pub fn new(origins: Vec<String>, origin_regex: &str) -> Result<Self, ConfigError> {
        for origin in &origins {
            let valid = origin
                .parse::<Uri>()
                .map(|uri| uri.scheme().is_some() && uri.host().is_some())
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::InvalidValue(format!(
                    "application.allowed_origins: {} is not an origin",
                    origin
                )));
            }
        }

        let origin_regex = match origin_regex.trim() {
            "" => None,
            pattern => Some(Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidValue(format!("application.cors_origin_regex: {}", e))
            })?),
        };

        Ok(Self {
            origins,
            origin_regex,
        })
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.origins.iter().any(|allowed| allowed == origin)
            || self
                .origin_regex
                .as_ref()
                .map_or(false, |regex| regex.is_match(origin))
    }

    pub fn middleware(&self) -> Cors {
        let mut cors = Cors::default()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        for origin in &self.origins {
            cors = cors.allowed_origin(origin);
        }
        if let Some(regex) = self.origin_regex.clone() {
            cors = cors.allowed_origin_fn(move |origin, _| {
                origin.to_str().map_or(false, |origin| regex.is_match(origin))
            });
        }
        cors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_allows_up_to_capacity() {
        let manager = RateLimiterManager::new(3);

        for _ in 0..3 {
            assert!(manager.check_rate_limit("127.0.0.1").is_ok());
        }
        assert!(manager.check_rate_limit("127.0.0.1").is_err());
    }

    #[test]
    fn test_rate_limiter_is_per_client() {
        let manager = RateLimiterManager::new(1);

        assert!(manager.check_rate_limit("10.0.0.1").is_ok());
        assert!(manager.check_rate_limit("10.0.0.1").is_err());
        assert!(manager.check_rate_limit("10.0.0.2").is_ok());
    }

    #[test]
    fn test_refilled_buckets_are_dropped() {
        // 100 tokens per second: one token is back after 10ms
        let manager = RateLimiterManager::new(6000);

        assert!(manager.check_rate_limit("10.0.0.1").is_ok());
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(manager.check_rate_limit("10.0.0.2").is_ok());

        let limiters = manager.limiters.lock().unwrap();
        assert_eq!(limiters.len(), 1);
        assert!(limiters.contains_key("10.0.0.2"));
    }

    #[test]
    fn test_drained_buckets_are_kept() {
        let manager = RateLimiterManager::new(1);

        assert!(manager.check_rate_limit("10.0.0.1").is_ok());
        assert!(manager.check_rate_limit("10.0.0.2").is_ok());

        assert_eq!(manager.limiters.lock().unwrap().len(), 2);
        assert!(manager.check_rate_limit("10.0.0.1").is_err());
    }

    #[test]
    fn test_cors_policy() {
        let policy = CorsPolicy::new(
            vec!["http://localhost:3000".to_string()],
            r"^https://fridgechef(-[a-z0-9]+)?\.vercel\.app$",
        )
        .unwrap();

        assert!(policy.allows("http://localhost:3000"));
        assert!(policy.allows("https://fridgechef-preview1.vercel.app"));
        assert!(!policy.allows("http://localhost:3001"));
        assert!(!policy.allows("https://evil.example.com"));
    }

    #[test]
    fn test_cors_policy_rejects_bad_settings() {
        assert!(CorsPolicy::new(vec!["*".to_string()], "").is_err());
        assert!(CorsPolicy::new(vec!["localhost".to_string()], "").is_err());
        assert!(CorsPolicy::new(vec![], "(unclosed").is_err());
        assert!(CorsPolicy::new(vec![], "").is_ok());
    }

    #[test]
    fn test_security_headers() {
        let headers = SecurityHeaders::get_headers();
        let names: Vec<_> = headers.iter().map(|(name, _)| *name).collect();

        assert!(names.contains(&"X-Content-Type-Options"));
        assert!(names.contains(&"Strict-Transport-Security"));
        assert!(names.contains(&"Content-Security-Policy"));
    }
}
