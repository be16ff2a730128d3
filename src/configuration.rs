use chrono::Duration;
use serde::Deserialize;

use crate::error::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub rate_limits: RateLimitSettings,
    /// Comma separated list of exact origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
    /// Origins matching this pattern are allowed as well. Empty disables it.
    #[serde(default = "default_cors_origin_regex")]
    pub cors_origin_regex: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password_hash_cost: default_password_hash_cost(),
            log_format: LogFormat::default(),
            rate_limits: RateLimitSettings::default(),
            allowed_origins: default_allowed_origins(),
            cors_origin_regex: default_cors_origin_regex(),
        }
    }
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allowed_origins_list(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Requests per minute per client address
#[derive(Deserialize, Clone, Copy, Debug)]
pub struct RateLimitSettings {
    pub register_per_minute: u32,
    pub login_per_minute: u32,
    pub refresh_per_minute: u32,
    #[serde(default = "default_logout_per_minute")]
    pub logout_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            register_per_minute: 3,
            login_per_minute: 5,
            refresh_per_minute: 10,
            logout_per_minute: default_logout_per_minute(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings
#[derive(Deserialize, Clone)]
pub struct JwtSettings {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_access_minutes")]
    pub access_token_expire_minutes: i64,
    #[serde(default = "default_refresh_days")]
    pub refresh_token_expire_days: i64,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"[redacted]")
            .field("issuer", &self.issuer)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("refresh_token_expire_days", &self.refresh_token_expire_days)
            .finish()
    }
}

impl JwtSettings {
    /// Saturates for values `validate` rejects as out of range
    pub fn access_ttl(&self) -> Duration {
        Duration::try_minutes(self.access_token_expire_minutes).unwrap_or_else(Duration::max_value)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::try_days(self.refresh_token_expire_days).unwrap_or_else(Duration::max_value)
    }

    /// Startup check. Any error here must stop the process.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret".to_string()));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.issuer".to_string()));
        }
        if self.access_token_expire_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.access_token_expire_minutes must be positive".to_string(),
            ));
        }
        if self.refresh_token_expire_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expire_days must be positive".to_string(),
            ));
        }
        let access = Duration::try_minutes(self.access_token_expire_minutes)
            .ok_or_else(|| out_of_range("jwt.access_token_expire_minutes"))?;
        let refresh = Duration::try_days(self.refresh_token_expire_days)
            .ok_or_else(|| out_of_range("jwt.refresh_token_expire_days"))?;
        let floor = access
            .checked_mul(10)
            .ok_or_else(|| out_of_range("jwt.access_token_expire_minutes"))?;
        if refresh < floor {
            return Err(ConfigError::InvalidValue(
                "jwt.refresh_token_expire_days must be at least ten access token lifetimes"
                    .to_string(),
            ));
        }
        if self.secret.len() < MIN_SECRET_LENGTH {
            tracing::warn!(
                length = self.secret.len(),
                "jwt.secret is shorter than {} bytes",
                MIN_SECRET_LENGTH
            );
        }
        Ok(())
    }
}

fn out_of_range(key: &str) -> ConfigError {
    ConfigError::InvalidValue(format!("{} is out of range", key))
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_logout_per_minute() -> u32 {
    10
}

fn default_allowed_origins() -> String {
    "http://localhost:3000,http://127.0.0.1:3000".to_string()
}

fn default_cors_origin_regex() -> String {
    r"^(https://fridgechef(-[a-z0-9]+)?\.vercel\.app|http://localhost(:\d+)?|http://127\.0\.0\.1(:\d+)?)$"
        .to_string()
}

fn default_issuer() -> String {
    "fridgechef".to_string()
}

fn default_access_minutes() -> i64 {
    30
}

fn default_refresh_days() -> i64 {
    7
}

/// Reads `configuration.yaml` (if present), then `APP__SECTION__KEY`
/// environment variables on top.
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
