//! API Route Definitions
//!
//! Wires the handlers into an axum router. Authenticated routes sit behind
//! the Bearer-token middleware; the remaining routes are public and rely on
//! the enumeration-safe request shapes for their own gating.

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};

use super::handlers::{self, AppState};
use super::middleware::auth_middleware;

/// Build the full router for the authentication core
pub fn create_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/password/change", post(handlers::change_password))
        .route(
            "/auth/phone/request",
            post(handlers::request_phone_verification),
        )
        .route(
            "/auth/phone/verify",
            post(handlers::confirm_phone_verification),
        )
        .route("/auth/sessions", get(handlers::list_sessions))
        .route("/auth/sessions/:id", delete(handlers::terminate_session))
        .route(
            "/auth/sessions/terminate-others",
            post(handlers::terminate_other_sessions),
        )
        .route_layer(from_fn_with_state(
            state.token_service.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/login/otp/request", post(handlers::request_login_otp))
        .route("/auth/login/otp/verify", post(handlers::verify_login_otp))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route(
            "/auth/password-reset/request",
            post(handlers::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::confirm_password_reset),
        )
        .route(
            "/auth/password-reset/complete",
            post(handlers::complete_password_reset),
        )
        .route(
            "/checkout/otp/request",
            post(handlers::request_checkout_code),
        )
        .route(
            "/checkout/otp/verify",
            post(handlers::confirm_checkout_code),
        )
        .merge(protected)
        .with_state(state)
}
