//! Authentication Middleware
//!
//! Validates Bearer access tokens and stashes the caller's context in the
//! request extensions for downstream handlers.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::models::auth::UserContext;
use crate::service::token::TokenService;
use crate::utils::error::AppError;

/// Extension type for storing authenticated user context in request extensions
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserContext);

/// Authentication middleware that validates JWT access tokens.
///
/// Extracts the Authorization header, checks the Bearer format, verifies
/// the token, and inserts the [`UserContext`] into request extensions. Any
/// failure answers with the shared invalid-credential shape.
pub async fn auth_middleware(
    State(token_service): State<Arc<TokenService>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AppError::InvalidCredential)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidCredential)?;

    let user_context = token_service
        .validate_access_token(token)
        .map_err(|_| AppError::InvalidCredential)?;

    request.extensions_mut().insert(AuthUser(user_context));

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::models::user::UserRole;
    use axum::{
        body::Body,
        http::{Method, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Extension, Router,
    };
    use tower::util::ServiceExt;
    use uuid::Uuid;

    fn token_service() -> Arc<TokenService> {
        Arc::new(TokenService::new(&JwtConfig {
            access_secret: "test_access_secret_key".to_string(),
            refresh_secret: "test_refresh_secret_key".to_string(),
            access_token_expires_minutes: 15,
            refresh_token_expires_days: 7,
        }))
    }

    async fn whoami(Extension(AuthUser(ctx)): Extension<AuthUser>) -> String {
        ctx.user_id.to_string()
    }

    fn app(service: Arc<TokenService>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(service, auth_middleware))
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = app(token_service())
            .oneshot(
                HttpRequest::builder()
                    .method(Method::GET)
                    .uri("/whoami")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_header_is_unauthorized() {
        let response = app(token_service())
            .oneshot(
                HttpRequest::builder()
                    .method(Method::GET)
                    .uri("/whoami")
                    .header(AUTHORIZATION, "Basic dXNlcjpwdw==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_token_is_rejected_as_access_token() {
        let service = token_service();
        let (refresh_token, _) = service
            .issue_refresh_token(Uuid::new_v4(), UserRole::Customer, Uuid::new_v4())
            .unwrap();

        let response = app(service)
            .oneshot(
                HttpRequest::builder()
                    .method(Method::GET)
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {refresh_token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler_with_context() {
        let service = token_service();
        let user_id = Uuid::new_v4();
        let token = service
            .issue_access_token(user_id, UserRole::Customer, Uuid::new_v4())
            .unwrap();

        let response = app(service)
            .oneshot(
                HttpRequest::builder()
                    .method(Method::GET)
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, user_id.to_string().as_bytes());
    }
}
