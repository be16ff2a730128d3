use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthGuard, CredentialHasher, RefreshExchange, RevocationStore, TokenCodec, TokenIssuer};
use crate::configuration::{ApplicationSettings, JwtSettings};
use crate::error::ConfigError;
use crate::logger::LoggerMiddleware;
use crate::middleware::{JwtMiddleware, RateLimit};
use crate::routes::{
    change_password, get_current_user, get_preferences, health_check, login, logout, refresh,
    register, update_preferences, whoami,
};
use crate::security::{CorsPolicy, RateLimiterManager, SecurityHeaders};
use crate::users::{UserLookup, UserStore};

fn invalid_config(e: ConfigError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
}

/// Wire every component together and start serving on `listener`.
///
/// Fails before serving anything if the token or CORS settings are unusable.
pub fn run<S>(
    listener: TcpListener,
    users: Arc<S>,
    application: ApplicationSettings,
    jwt: JwtSettings,
) -> Result<Server, std::io::Error>
where
    S: UserStore + 'static,
{
    jwt.validate().map_err(invalid_config)?;
    let cors = CorsPolicy::new(
        application.allowed_origins_list(),
        &application.cors_origin_regex,
    )
    .map_err(invalid_config)?;

    let codec = Arc::new(TokenCodec::from_settings(&jwt).map_err(invalid_config)?);
    let issuer = Arc::new(TokenIssuer::from_settings(codec.clone(), &jwt));
    let revocations = Arc::new(RevocationStore::new());

    let lookup: Arc<dyn UserLookup> = users.clone();
    let store: Arc<dyn UserStore> = users;

    let guard = Arc::new(AuthGuard::new(codec, revocations.clone(), lookup.clone()));
    let exchange = web::Data::new(RefreshExchange::new(issuer.clone(), lookup));

    let store = web::Data::from(store);
    let issuer = web::Data::from(issuer);
    let revocations = web::Data::from(revocations);
    let hasher = web::Data::new(CredentialHasher::new(application.password_hash_cost));

    let limits = application.rate_limits;
    let register_limiter = Arc::new(RateLimiterManager::new(limits.register_per_minute));
    let login_limiter = Arc::new(RateLimiterManager::new(limits.login_per_minute));
    let refresh_limiter = Arc::new(RateLimiterManager::new(limits.refresh_per_minute));
    let logout_limiter = Arc::new(RateLimiterManager::new(limits.logout_per_minute));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(SecurityHeaders::middleware())
            .wrap(cors.middleware())
            .wrap(LoggerMiddleware)
            .app_data(store.clone())
            .app_data(issuer.clone())
            .app_data(revocations.clone())
            .app_data(exchange.clone())
            .app_data(hasher.clone())
            .route("/health", web::get().to(health_check))
            .service(
                web::scope("/api/v1")
                    .service(
                        web::resource("/auth/register")
                            .wrap(RateLimit::new(register_limiter.clone()))
                            .route(web::post().to(register)),
                    )
                    .service(
                        web::resource("/auth/login")
                            .wrap(RateLimit::new(login_limiter.clone()))
                            .route(web::post().to(login)),
                    )
                    .service(
                        web::resource("/auth/refresh")
                            .wrap(RateLimit::new(refresh_limiter.clone()))
                            .route(web::post().to(refresh)),
                    )
                    .service(
                        web::resource("/auth/logout")
                            .wrap(RateLimit::new(logout_limiter.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/auth/me")
                            .wrap(JwtMiddleware::required(guard.clone()))
                            .route(web::get().to(get_current_user)),
                    )
                    .service(
                        web::resource("/auth/whoami")
                            .wrap(JwtMiddleware::optional(guard.clone()))
                            .route(web::get().to(whoami)),
                    )
                    .service(
                        web::scope("/user")
                            .wrap(JwtMiddleware::required(guard.clone()))
                            .service(
                                web::resource("/preferences")
                                    .route(web::get().to(get_preferences))
                                    .route(web::put().to(update_preferences)),
                            )
                            .route("/password", web::post().to(change_password)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
