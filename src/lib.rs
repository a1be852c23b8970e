//! Commerce Auth
//!
//! The identity-verification and session-lifecycle core of an e-commerce
//! backend: issues and rotates signed credential pairs, verifies one-time
//! codes for phone/password flows, and tracks and revokes logged-in
//! sessions across devices.
//!
//! # Features
//!
//! - **Credential pairs**: short-lived access tokens plus revocable,
//!   single-use refresh tokens (rotate-and-invalidate on every refresh)
//! - **One-time codes**: purpose-scoped challenges with hashed codes,
//!   atomic attempt counting, and supersede-on-reissue semantics
//! - **Session registry**: per-device listing with best-effort device
//!   descriptors, ownership-checked termination, terminate-all-others
//! - **Abuse guard**: atomic rolling-window admission for sends and logins
//! - **Password reset**: OTP-gated, single-use reset tokens, all sessions
//!   invalidated on completion
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use commerce_auth::{
//!     api::{create_routes, AppState},
//!     cache::InMemoryCache,
//!     config::JwtConfig,
//!     service::{
//!         AbuseGuard, AuthService, DeliveryRouter, OtpService, PasswordResetService,
//!         SessionService, TokenService,
//!     },
//!     store::{MemoryResetTokenStore, MemorySessionStore, MemoryUserStore},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = Arc::new(InMemoryCache::new());
//!     let users = Arc::new(MemoryUserStore::new());
//!     let delivery = Arc::new(DeliveryRouter::new(None, None));
//!
//!     let jwt = JwtConfig {
//!         access_secret: "access-secret".into(),
//!         refresh_secret: "refresh-secret".into(),
//!         access_token_expires_minutes: 15,
//!         refresh_token_expires_days: 7,
//!     };
//!     let tokens = TokenService::new(&jwt);
//!     let guard = AbuseGuard::new(cache.clone());
//!     let otp = Arc::new(OtpService::new(cache, guard.clone(), delivery));
//!     let sessions = SessionService::new(Arc::new(MemorySessionStore::new()));
//!     let reset = PasswordResetService::new(
//!         users.clone(),
//!         Arc::new(MemoryResetTokenStore::new()),
//!         otp.clone(),
//!         sessions.clone(),
//!         tokens.clone(),
//!         12,
//!         15,
//!     );
//!     let auth = AuthService::new(users, sessions, tokens.clone(), otp, guard, reset, 12);
//!
//!     let app = create_routes(AppState {
//!         auth_service: Arc::new(auth),
//!         token_service: Arc::new(tokens),
//!     });
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **API layer**: HTTP handlers, routes, and Bearer-token middleware
//! - **Service layer**: abuse guard, OTP challenge manager, token issuer,
//!   session registry, password reset flow, auth orchestrator
//! - **Stores**: persistence and cache collaborators behind traits, with
//!   Postgres and in-memory implementations
//! - **Models**: data structures and request/response types
//! - **Utils**: error taxonomy, security primitives, validation, UA parsing

/// HTTP API layer with handlers, routing, and auth middleware
pub mod api;

/// Cache collaborator: TTL key-value store with atomic counters
pub mod cache;

/// Configuration management for all service settings
pub mod config;

/// Database connection management and configuration
pub mod database;

/// Data models and request/response structures
pub mod models;

/// Business logic services
pub mod service;

/// Persistence collaborator: repository traits and implementations
pub mod store;

/// Shared utilities for security, validation, and error handling
pub mod utils;

// Re-export commonly used types for convenient access
pub use api::{create_routes, AppState};
pub use models::{
    auth::{TokenPair, UserContext},
    otp::{OtpIssued, OtpOutcome, OtpPurpose},
    session::{ClientMeta, DeviceInfo, Session, SessionView},
    user::{User, UserRole},
};
pub use service::{
    AbuseGuard, AuthService, OtpService, PasswordResetService, SessionService, TokenService,
};
pub use utils::error::{AppError, AppResult, ErrorResponse};

// Re-export database utilities for configuration
pub use database::{DatabaseConfig, DatabasePool};

// Re-export configuration system
pub use config::AppConfig;

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
