//! Commerce Auth Development Server
//!
//! Wires the authentication core into a complete HTTP server backed by
//! PostgreSQL: configuration from the environment, migrations on boot, the
//! full route set, and a periodic sweep for expired sessions, reset
//! tokens, and cache entries.

use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use commerce_auth::{
    api::{create_routes, AppState},
    cache::{CacheStore, PgCacheStore},
    config::AppConfig,
    service::{
        AbuseGuard, AuthService, DeliveryRouter, OtpService, PasswordResetService,
        SessionService, SmsGatewayDelivery, SmtpCodeDelivery, TokenService,
    },
    store::{PgResetTokenStore, PgSessionStore, PgUserStore},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv().ok();

    env_logger::init();

    log::info!("Starting commerce-auth v{}", commerce_auth::VERSION);

    // Load and validate configuration once; services receive it by reference
    let config = AppConfig::from_env()?;
    config.validate()?;

    log::info!("Configuration loaded and validated");

    let pool = config.database.create_pool().await?;

    log::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database migrations completed");

    // Collaborators
    let cache: Arc<dyn CacheStore> = Arc::new(PgCacheStore::new(pool.clone()));
    let users = Arc::new(PgUserStore::new(pool.clone()));
    let session_store = Arc::new(PgSessionStore::new(pool.clone()));
    let reset_token_store = Arc::new(PgResetTokenStore::new(pool.clone()));

    let smtp = match &config.smtp {
        Some(smtp_config) => Some(SmtpCodeDelivery::new(smtp_config)?),
        None => None,
    };
    let sms = config.sms.as_ref().map(SmsGatewayDelivery::new);
    log::info!(
        "Code delivery channels: email={}, sms={}",
        smtp.is_some(),
        sms.is_some()
    );
    let delivery = Arc::new(DeliveryRouter::new(smtp, sms));

    // Core services
    let tokens = TokenService::new(&config.jwt);
    let guard = AbuseGuard::new(cache.clone());
    let otp = Arc::new(OtpService::new(cache.clone(), guard.clone(), delivery));
    let sessions = SessionService::new(session_store);
    let reset = PasswordResetService::new(
        users.clone(),
        reset_token_store,
        otp.clone(),
        sessions.clone(),
        tokens.clone(),
        config.security.bcrypt_cost,
        config.security.reset_token_expires_minutes,
    );
    let auth = AuthService::new(
        users,
        sessions.clone(),
        tokens.clone(),
        otp,
        guard,
        reset.clone(),
        config.security.bcrypt_cost,
    );

    log::info!("Services initialized");

    // Periodic sweep for rows past their TTL. Correctness never depends on
    // it (every read re-checks expiry); it only keeps the tables small.
    {
        let sessions = sessions.clone();
        let reset = reset.clone();
        let cache = cache.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match sessions.purge_expired().await {
                    Ok(n) if n > 0 => log::info!("swept {n} expired session(s)"),
                    Ok(_) => {}
                    Err(e) => log::warn!("session sweep failed: {e}"),
                }
                match reset.purge_expired().await {
                    Ok(n) if n > 0 => log::info!("swept {n} expired reset token(s)"),
                    Ok(_) => {}
                    Err(e) => log::warn!("reset token sweep failed: {e}"),
                }
                match cache.purge_expired().await {
                    Ok(n) if n > 0 => log::debug!("swept {n} expired cache entr(ies)"),
                    Ok(_) => {}
                    Err(e) => log::warn!("cache sweep failed: {e}"),
                }
            }
        });
    }

    let app_state = AppState {
        auth_service: Arc::new(auth),
        token_service: Arc::new(tokens),
    };

    let app = create_routes(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any) // Permissive CORS for development
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .into_inner(),
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
