//! HTTP Handlers
//!
//! Thin translation between HTTP requests and the auth orchestrator. The
//! handlers capture client metadata (User-Agent, origin IP) for session
//! records and map service results to JSON; all error mapping lives in
//! [`AppError`]'s `IntoResponse` impl.

use axum::{
    extract::{Path, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::otp::OtpIssued;
use crate::models::requests::{
    AuthResponse, ChangePasswordRequest, CodeRequestedResponse, LoginRequest, MessageResponse,
    OwnCodeRequest, RefreshTokenRequest, RegisterRequest, RequestCodeRequest,
    ResetCompleteRequest, ResetConfirmRequest, ResetConfirmResponse, ResetRequestRequest,
    SessionListResponse, SessionsTerminatedResponse, VerifyCodeRequest, VerifyOwnCodeRequest,
};
use crate::models::session::ClientMeta;
use crate::models::user::User;
use crate::service::auth::AuthService;
use crate::service::token::TokenService;
use crate::utils::error::AppResult;

use super::middleware::AuthUser;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub token_service: Arc<TokenService>,
}

/// Capture best-effort client metadata from request headers
fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let ip = header_str("x-forwarded-for")
        .and_then(|list| list.split(',').next().map(|ip| ip.trim().to_string()))
        .or_else(|| header_str("x-real-ip"));

    ClientMeta {
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip,
        location: None,
    }
}

fn code_requested(issued: OtpIssued) -> CodeRequestedResponse {
    CodeRequestedResponse {
        message: "If the destination is registered, a code has been sent".to_string(),
        expires_in: (issued.expires_at - Utc::now()).num_seconds().max(0) as u64,
        resend_after: issued.resend_after_seconds,
    }
}

/// GET /health
pub async fn health_check() -> Json<MessageResponse> {
    Json(MessageResponse::new("ok"))
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = state
        .auth_service
        .login(request, &client_meta(&headers))
        .await?;
    Ok(Json(response))
}

/// POST /auth/login/otp/request
pub async fn request_login_otp(
    State(state): State<AppState>,
    Json(request): Json<RequestCodeRequest>,
) -> AppResult<Json<CodeRequestedResponse>> {
    let issued = state
        .auth_service
        .request_login_otp(&request.destination, &request.session_ref)
        .await?;
    Ok(Json(code_requested(issued)))
}

/// POST /auth/login/otp/verify
pub async fn verify_login_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyCodeRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = state
        .auth_service
        .login_with_otp(
            &request.destination,
            &request.code,
            &request.session_ref,
            &client_meta(&headers),
        )
        .await?;
    Ok(Json(response))
}

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> AppResult<Json<crate::models::auth::TokenPair>> {
    let pair = state.auth_service.refresh(&request.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(AuthUser(ctx)): Extension<AuthUser>,
) -> AppResult<Json<MessageResponse>> {
    state.auth_service.logout(&ctx).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

/// POST /auth/password/change
pub async fn change_password(
    State(state): State<AppState>,
    Extension(AuthUser(ctx)): Extension<AuthUser>,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .auth_service
        .change_password(ctx.user_id, request)
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

/// POST /auth/phone/request
pub async fn request_phone_verification(
    State(state): State<AppState>,
    Extension(AuthUser(ctx)): Extension<AuthUser>,
    Json(request): Json<OwnCodeRequest>,
) -> AppResult<Json<CodeRequestedResponse>> {
    let issued = state
        .auth_service
        .request_phone_verification(ctx.user_id, &request.session_ref)
        .await?;
    Ok(Json(code_requested(issued)))
}

/// POST /auth/phone/verify
pub async fn confirm_phone_verification(
    State(state): State<AppState>,
    Extension(AuthUser(ctx)): Extension<AuthUser>,
    Json(request): Json<VerifyOwnCodeRequest>,
) -> AppResult<Json<User>> {
    let user = state
        .auth_service
        .confirm_phone_verification(ctx.user_id, &request.code, &request.session_ref)
        .await?;
    Ok(Json(user))
}

/// POST /auth/password-reset/request
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequestRequest>,
) -> AppResult<Json<CodeRequestedResponse>> {
    let issued = state
        .auth_service
        .request_password_reset(&request.identifier, &request.session_ref)
        .await?;
    Ok(Json(code_requested(issued)))
}

/// POST /auth/password-reset/confirm
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetConfirmRequest>,
) -> AppResult<Json<ResetConfirmResponse>> {
    let grant = state
        .auth_service
        .confirm_password_reset(&request.identifier, &request.code, &request.session_ref)
        .await?;
    Ok(Json(ResetConfirmResponse {
        reset_token: grant.reset_token,
        expires_in: (grant.expires_at - Utc::now()).num_seconds().max(0) as u64,
        user: grant.user,
    }))
}

/// POST /auth/password-reset/complete
pub async fn complete_password_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ResetCompleteRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (user, tokens) = state
        .auth_service
        .complete_password_reset(
            &request.reset_token,
            &request.new_password,
            &client_meta(&headers),
        )
        .await?;
    Ok(Json(AuthResponse { user, tokens }))
}

/// GET /auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(AuthUser(ctx)): Extension<AuthUser>,
) -> AppResult<Json<SessionListResponse>> {
    let sessions = state.auth_service.list_sessions(&ctx).await?;
    Ok(Json(SessionListResponse { sessions }))
}

/// DELETE /auth/sessions/:id
pub async fn terminate_session(
    State(state): State<AppState>,
    Extension(AuthUser(ctx)): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state
        .auth_service
        .terminate_session(&ctx, session_id)
        .await?;
    Ok(Json(MessageResponse::new("Session terminated")))
}

/// POST /auth/sessions/terminate-others
pub async fn terminate_other_sessions(
    State(state): State<AppState>,
    Extension(AuthUser(ctx)): Extension<AuthUser>,
) -> AppResult<Json<SessionsTerminatedResponse>> {
    let terminated = state.auth_service.terminate_other_sessions(&ctx).await?;
    Ok(Json(SessionsTerminatedResponse { terminated }))
}

/// POST /checkout/otp/request
pub async fn request_checkout_code(
    State(state): State<AppState>,
    Json(request): Json<RequestCodeRequest>,
) -> AppResult<Json<CodeRequestedResponse>> {
    let issued = state
        .auth_service
        .request_checkout_code(&request.destination, &request.session_ref)
        .await?;
    Ok(Json(code_requested(issued)))
}

/// POST /checkout/otp/verify
pub async fn confirm_checkout_code(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .auth_service
        .confirm_checkout_code(&request.destination, &request.code, &request.session_ref)
        .await?;
    Ok(Json(MessageResponse::new("Destination confirmed")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_meta_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, "curl/8.0".parse().unwrap());
        headers.insert(
            "x-forwarded-for",
            "203.0.113.9, 10.0.0.1".parse().unwrap(),
        );
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());

        let meta = client_meta(&headers);
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn test_client_meta_tolerates_missing_headers() {
        let meta = client_meta(&HeaderMap::new());
        assert!(meta.user_agent.is_none());
        assert!(meta.ip.is_none());
        assert!(meta.location.is_none());
    }
}
