//! Auth Orchestrator
//!
//! The façade the HTTP layer talks to: registration, password and OTP
//! login, refresh rotation, logout, password changes, phone verification,
//! guest checkout codes, the password reset flow, and the session
//! listing/termination pass-throughs. Every failure is a typed
//! [`AppError`]; nothing panics across this boundary.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::models::auth::{TokenPair, UserContext};
use crate::models::otp::{OtpIssued, OtpPurpose};
use crate::models::requests::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest,
};
use crate::models::session::{ClientMeta, SessionView};
use crate::models::user::{NewUser, User, UserRole};
use crate::service::abuse_guard::{AbuseGuard, PASSWORD_LOGIN_RULE};
use crate::service::otp::OtpService;
use crate::service::password_reset::{PasswordResetService, ResetGrant};
use crate::service::session::SessionService;
use crate::service::token::TokenService;
use crate::store::{find_user_by_identifier, UserStore};
use crate::utils::error::{AppError, AppResult};
use crate::utils::security::{hash_password_with_cost, hash_sensitive_data, verify_password};
use crate::utils::validation::{normalize_email, normalize_identifier, normalize_phone};

/// Composition root for the authentication core
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: SessionService,
    tokens: TokenService,
    otp: Arc<OtpService>,
    guard: AbuseGuard,
    reset: PasswordResetService,
    bcrypt_cost: u32,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: SessionService,
        tokens: TokenService,
        otp: Arc<OtpService>,
        guard: AbuseGuard,
        reset: PasswordResetService,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            otp,
            guard,
            reset,
            bcrypt_cost,
        }
    }

    /// Create a new account with a password and at least one identifier
    pub async fn register(&self, request: RegisterRequest) -> AppResult<User> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let email = request.email.as_deref().map(normalize_email);
        let phone = request.phone.as_deref().map(normalize_phone);
        if email.is_none() && phone.is_none() {
            return Err(AppError::Validation(
                "Either an email address or a phone number is required".to_string(),
            ));
        }

        let password_hash = hash_password_with_cost(&request.password, self.bcrypt_cost)?;

        let record = self
            .users
            .insert(NewUser {
                name: request.name,
                email,
                phone,
                password_hash: Some(password_hash),
                role: UserRole::Customer,
            })
            .await?;

        Ok(record.into())
    }

    /// Password login. "No such account" and "wrong password" answer
    /// identically, and the abuse guard admits the attempt before any
    /// lookup happens.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientMeta,
    ) -> AppResult<AuthResponse> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let identifier = normalize_identifier(&request.identifier);
        self.guard.admit(&identifier, &PASSWORD_LOGIN_RULE).await?;

        let Some(record) = find_user_by_identifier(self.users.as_ref(), &identifier).await? else {
            return Err(AppError::InvalidCredential);
        };
        let Some(password_hash) = record.password_hash.as_deref() else {
            return Err(AppError::InvalidCredential);
        };
        if !verify_password(&request.password, password_hash)? {
            return Err(AppError::InvalidCredential);
        }

        let pair = self
            .sessions
            .establish(&self.tokens, record.id, record.role(), client)
            .await?;

        Ok(AuthResponse {
            user: record.into(),
            tokens: pair,
        })
    }

    /// Request a passwordless sign-in code. Success-shaped whether or not
    /// the identifier resolves to an account.
    pub async fn request_login_otp(
        &self,
        destination: &str,
        session_ref: &str,
    ) -> AppResult<OtpIssued> {
        self.issue_discreetly(&normalize_identifier(destination), OtpPurpose::Login, session_ref)
            .await
    }

    /// Complete a passwordless sign-in with a verified code
    pub async fn login_with_otp(
        &self,
        destination: &str,
        code: &str,
        session_ref: &str,
        client: &ClientMeta,
    ) -> AppResult<AuthResponse> {
        let destination = normalize_identifier(destination);

        self.otp
            .verify(&destination, OtpPurpose::Login, session_ref, code)
            .await?
            .into_result()?;

        let Some(record) = find_user_by_identifier(self.users.as_ref(), &destination).await?
        else {
            return Err(AppError::InvalidCredential);
        };

        let pair = self
            .sessions
            .establish(&self.tokens, record.id, record.role(), client)
            .await?;

        Ok(AuthResponse {
            user: record.into(),
            tokens: pair,
        })
    }

    /// Send a verification code to the caller's own phone number
    pub async fn request_phone_verification(
        &self,
        user_id: Uuid,
        session_ref: &str,
    ) -> AppResult<OtpIssued> {
        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let Some(phone) = record.phone.clone() else {
            return Err(AppError::Validation(
                "No phone number on file".to_string(),
            ));
        };
        if record.phone_verified {
            return Err(AppError::Conflict("Phone already verified".to_string()));
        }

        self.otp
            .issue(&phone, OtpPurpose::PhoneVerification, session_ref)
            .await
    }

    /// Confirm the phone verification code and set the account flag
    pub async fn confirm_phone_verification(
        &self,
        user_id: Uuid,
        code: &str,
        session_ref: &str,
    ) -> AppResult<User> {
        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let Some(phone) = record.phone.clone() else {
            return Err(AppError::Validation(
                "No phone number on file".to_string(),
            ));
        };

        self.otp
            .verify(&phone, OtpPurpose::PhoneVerification, session_ref, code)
            .await?
            .into_result()?;

        self.users.set_phone_verified(user_id).await?;

        let refreshed = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
        Ok(refreshed.into())
    }

    /// Send a confirmation code for a guest checkout; no account required
    pub async fn request_checkout_code(
        &self,
        destination: &str,
        session_ref: &str,
    ) -> AppResult<OtpIssued> {
        self.otp
            .issue(
                &normalize_identifier(destination),
                OtpPurpose::GuestCheckout,
                session_ref,
            )
            .await
    }

    /// Verify a guest checkout confirmation code
    pub async fn confirm_checkout_code(
        &self,
        destination: &str,
        code: &str,
        session_ref: &str,
    ) -> AppResult<()> {
        self.otp
            .verify(
                &normalize_identifier(destination),
                OtpPurpose::GuestCheckout,
                session_ref,
                code,
            )
            .await?
            .into_result()
    }

    /// Rotate a refresh token into a fresh pair.
    ///
    /// Signature and expiry are necessary but not sufficient: the session
    /// registry must still hold a live row for the token's hash. Rotation
    /// swaps the row's hash, so the presented token is single-use and dies
    /// here even though its signature stays valid until natural expiry.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.tokens.verify_refresh(refresh_token)?;

        let token_hash = hash_sensitive_data(refresh_token);
        let Some(session) = self.sessions.live_session_for_token(&token_hash).await? else {
            return Err(AppError::Unauthorized(
                "Session revoked or expired".to_string(),
            ));
        };

        // The token's embedded session must be the row we found.
        if claims.session_id != session.id.to_string() {
            return Err(AppError::InvalidCredential);
        }

        let Some(record) = self.users.find_by_id(session.user_id).await? else {
            return Err(AppError::InvalidCredential);
        };

        let (pair, refresh_expires_at) =
            self.tokens
                .issue_pair(record.id, record.role(), session.id)?;
        self.sessions
            .rotate(
                session.id,
                &hash_sensitive_data(&pair.refresh_token),
                refresh_expires_at,
            )
            .await?;

        Ok(pair)
    }

    /// Terminate the caller's own session. Idempotent: a session that is
    /// already gone is not an error.
    pub async fn logout(&self, ctx: &UserContext) -> AppResult<()> {
        match self.sessions.terminate(ctx.session_id, ctx.user_id).await {
            Ok(()) => Ok(()),
            Err(AppError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Change the password of an authenticated account; requires the
    /// current password to match first.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        request: ChangePasswordRequest,
    ) -> AppResult<()> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let record = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let Some(current_hash) = record.password_hash.as_deref() else {
            return Err(AppError::InvalidCredential);
        };
        if !verify_password(&request.current_password, current_hash)? {
            return Err(AppError::InvalidCredential);
        }

        let new_hash = hash_password_with_cost(&request.new_password, self.bcrypt_cost)?;
        self.users.set_password(user_id, &new_hash).await?;

        Ok(())
    }

    /// The caller's sessions, most recently active first
    pub async fn list_sessions(&self, ctx: &UserContext) -> AppResult<Vec<SessionView>> {
        self.sessions.list(ctx.user_id, Some(ctx.session_id)).await
    }

    /// Terminate one of the caller's sessions by id
    pub async fn terminate_session(&self, ctx: &UserContext, session_id: Uuid) -> AppResult<()> {
        self.sessions.terminate(session_id, ctx.user_id).await
    }

    /// Terminate every session of the caller's except the current one
    pub async fn terminate_other_sessions(&self, ctx: &UserContext) -> AppResult<u64> {
        self.sessions
            .terminate_all_except(ctx.user_id, Some(ctx.session_id))
            .await
    }

    /// Step 1 of the reset flow (pass-through)
    pub async fn request_password_reset(
        &self,
        identifier: &str,
        session_ref: &str,
    ) -> AppResult<OtpIssued> {
        self.reset.request_reset(identifier, session_ref).await
    }

    /// Step 2 of the reset flow (pass-through)
    pub async fn confirm_password_reset(
        &self,
        identifier: &str,
        code: &str,
        session_ref: &str,
    ) -> AppResult<ResetGrant> {
        self.reset.confirm_code(identifier, code, session_ref).await
    }

    /// Step 3 of the reset flow (pass-through)
    pub async fn complete_password_reset(
        &self,
        reset_token: &str,
        new_password: &str,
        client: &ClientMeta,
    ) -> AppResult<(User, TokenPair)> {
        self.reset.complete(reset_token, new_password, client).await
    }

    /// Issue a code only when the destination belongs to an account, but
    /// answer identically either way, burning the same send budget.
    async fn issue_discreetly(
        &self,
        destination: &str,
        purpose: OtpPurpose,
        session_ref: &str,
    ) -> AppResult<OtpIssued> {
        if find_user_by_identifier(self.users.as_ref(), destination)
            .await?
            .is_some()
        {
            self.otp.issue(destination, purpose, session_ref).await
        } else {
            self.otp.admit_send(destination, purpose).await?;
            let policy = self.otp.policy(purpose);
            Ok(OtpIssued {
                destination: destination.to_string(),
                purpose,
                expires_at: Utc::now() + ChronoDuration::seconds(policy.code_ttl_seconds as i64),
                resend_after_seconds: policy.resend_window_seconds,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::config::JwtConfig;
    use crate::service::otp::tests::{service_with, RecordingDelivery};
    use crate::store::{MemoryResetTokenStore, MemorySessionStore, MemoryUserStore};

    struct Harness {
        auth: AuthService,
        delivery: Arc<RecordingDelivery>,
        tokens: TokenService,
    }

    fn harness() -> Harness {
        let users: Arc<MemoryUserStore> = Arc::new(MemoryUserStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let delivery = Arc::new(RecordingDelivery::default());
        let otp = Arc::new(service_with(cache.clone(), delivery.clone()));
        let guard = AbuseGuard::new(cache);
        let sessions = SessionService::new(Arc::new(MemorySessionStore::new()));
        let tokens = TokenService::new(&JwtConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_token_expires_minutes: 15,
            refresh_token_expires_days: 7,
        });
        let reset = PasswordResetService::new(
            users.clone(),
            Arc::new(MemoryResetTokenStore::new()),
            otp.clone(),
            sessions.clone(),
            tokens.clone(),
            4,
            15,
        );

        let auth = AuthService::new(
            users,
            sessions,
            tokens.clone(),
            otp,
            guard,
            reset,
            4,
        );

        Harness {
            auth,
            delivery,
            tokens,
        }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("Asha Rahman".to_string()),
            email: Some(email.to_string()),
            phone: None,
            password: "SecurePass123!".to_string(),
        }
    }

    async fn registered_user(h: &Harness, email: &str) -> User {
        h.auth.register(register_request(email)).await.unwrap()
    }

    async fn login_ctx(h: &Harness, email: &str, password: &str) -> (UserContext, TokenPair) {
        let response = h
            .auth
            .login(
                LoginRequest {
                    identifier: email.to_string(),
                    password: password.to_string(),
                },
                &ClientMeta::default(),
            )
            .await
            .unwrap();
        let ctx = h
            .tokens
            .validate_access_token(&response.tokens.access_token)
            .unwrap();
        (ctx, response.tokens)
    }

    #[tokio::test]
    async fn test_register_normalizes_and_rejects_duplicates() {
        let h = harness();

        let user = h
            .auth
            .register(register_request("Admin@Example.COM"))
            .await
            .unwrap();
        assert_eq!(user.email.as_deref(), Some("admin@example.com"));
        assert_eq!(user.role, UserRole::Customer);

        let err = h
            .auth
            .register(register_request("admin@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_requires_an_identifier() {
        let h = harness();
        let err = h
            .auth
            .register(RegisterRequest {
                name: None,
                email: None,
                phone: None,
                password: "SecurePass123!".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_creates_exactly_one_session() {
        let h = harness();
        let user = registered_user(&h, "admin@example.com").await;

        let (ctx, _) = login_ctx(&h, "admin@example.com", "SecurePass123!").await;
        assert_eq!(ctx.user_id, user.id);

        let sessions = h.auth.list_sessions(&ctx).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_current);
    }

    #[tokio::test]
    async fn test_login_failures_share_one_shape() {
        let h = harness();
        registered_user(&h, "admin@example.com").await;

        let wrong_password = h
            .auth
            .login(
                LoginRequest {
                    identifier: "admin@example.com".to_string(),
                    password: "WrongPass123!".to_string(),
                },
                &ClientMeta::default(),
            )
            .await
            .unwrap_err();
        let unknown_user = h
            .auth
            .login(
                LoginRequest {
                    identifier: "ghost@example.com".to_string(),
                    password: "SecurePass123!".to_string(),
                },
                &ClientMeta::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AppError::InvalidCredential));
        assert!(matches!(unknown_user, AppError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_login_attempts_are_rate_limited() {
        let h = harness();
        registered_user(&h, "admin@example.com").await;

        // The password-login rule admits 5 attempts per window.
        for _ in 0..5 {
            let _ = h
                .auth
                .login(
                    LoginRequest {
                        identifier: "admin@example.com".to_string(),
                        password: "WrongPass123!".to_string(),
                    },
                    &ClientMeta::default(),
                )
                .await;
        }

        let err = h
            .auth
            .login(
                LoginRequest {
                    identifier: "admin@example.com".to_string(),
                    password: "SecurePass123!".to_string(),
                },
                &ClientMeta::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_otp_login_round_trip() {
        let h = harness();
        let user = registered_user(&h, "admin@example.com").await;

        h.auth
            .request_login_otp("admin@example.com", "device-1")
            .await
            .unwrap();
        let code = h.delivery.last_code().unwrap();

        let response = h
            .auth
            .login_with_otp("admin@example.com", &code, "device-1", &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(response.user.id, user.id);
    }

    #[tokio::test]
    async fn test_otp_login_request_is_success_shaped_for_unknown() {
        let h = harness();

        let issued = h
            .auth
            .request_login_otp("ghost@example.com", "device-1")
            .await
            .unwrap();
        assert_eq!(issued.purpose, OtpPurpose::Login);
        assert!(h.delivery.last_code().is_none());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_invalidates_predecessor() {
        let h = harness();
        registered_user(&h, "admin@example.com").await;
        let (_, pair) = login_ctx(&h, "admin@example.com", "SecurePass123!").await;

        let rotated = h.auth.refresh(&pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        // The superseded refresh token no longer matches any session row.
        let err = h.auth.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        // The successor works.
        assert!(h.auth.refresh(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_fails_after_session_termination() {
        let h = harness();
        registered_user(&h, "admin@example.com").await;
        let (ctx, pair) = login_ctx(&h, "admin@example.com", "SecurePass123!").await;

        h.auth.logout(&ctx).await.unwrap();

        // Signature and expiry are still valid; the registry row is gone.
        assert!(h.tokens.verify_refresh(&pair.refresh_token).is_ok());
        let err = h.auth.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let h = harness();
        registered_user(&h, "admin@example.com").await;
        let (ctx, _) = login_ctx(&h, "admin@example.com", "SecurePass123!").await;

        h.auth.logout(&ctx).await.unwrap();
        h.auth.logout(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_password_requires_current() {
        let h = harness();
        let user = registered_user(&h, "admin@example.com").await;

        let err = h
            .auth
            .change_password(
                user.id,
                ChangePasswordRequest {
                    current_password: "WrongPass123!".to_string(),
                    new_password: "BrandNewPass1!".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCredential));

        h.auth
            .change_password(
                user.id,
                ChangePasswordRequest {
                    current_password: "SecurePass123!".to_string(),
                    new_password: "BrandNewPass1!".to_string(),
                },
            )
            .await
            .unwrap();

        // The new password logs in; the old one does not.
        assert!(h
            .auth
            .login(
                LoginRequest {
                    identifier: "admin@example.com".to_string(),
                    password: "BrandNewPass1!".to_string(),
                },
                &ClientMeta::default(),
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_terminate_other_sessions_keeps_caller() {
        let h = harness();
        registered_user(&h, "admin@example.com").await;

        let (_, _) = login_ctx(&h, "admin@example.com", "SecurePass123!").await;
        let (_, _) = login_ctx(&h, "admin@example.com", "SecurePass123!").await;
        let (ctx, _) = login_ctx(&h, "admin@example.com", "SecurePass123!").await;

        let terminated = h.auth.terminate_other_sessions(&ctx).await.unwrap();
        assert_eq!(terminated, 2);

        let sessions = h.auth.list_sessions(&ctx).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(sessions[0].is_current);
    }

    #[tokio::test]
    async fn test_terminate_session_cannot_cross_users() {
        let h = harness();
        registered_user(&h, "first@example.com").await;
        registered_user(&h, "second@example.com").await;

        let (first_ctx, _) = login_ctx(&h, "first@example.com", "SecurePass123!").await;
        let (second_ctx, _) = login_ctx(&h, "second@example.com", "SecurePass123!").await;

        let victim = h.auth.list_sessions(&first_ctx).await.unwrap()[0].id;
        let err = h
            .auth
            .terminate_session(&second_ctx, victim)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // Untouched.
        assert_eq!(h.auth.list_sessions(&first_ctx).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_phone_verification_sets_flag() {
        let h = harness();
        let user = h
            .auth
            .register(RegisterRequest {
                name: None,
                email: None,
                phone: Some("+8801712345678".to_string()),
                password: "SecurePass123!".to_string(),
            })
            .await
            .unwrap();
        assert!(!user.phone_verified);

        h.auth
            .request_phone_verification(user.id, "device-1")
            .await
            .unwrap();
        let code = h.delivery.last_code().unwrap();

        let verified = h
            .auth
            .confirm_phone_verification(user.id, &code, "device-1")
            .await
            .unwrap();
        assert!(verified.phone_verified);

        // A second request is refused once verified.
        let err = h
            .auth
            .request_phone_verification(user.id, "device-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_guest_checkout_code_needs_no_account() {
        let h = harness();

        h.auth
            .request_checkout_code("+8801712345678", "cart-77")
            .await
            .unwrap();
        let code = h.delivery.last_code().unwrap();

        h.auth
            .confirm_checkout_code("+8801712345678", &code, "cart-77")
            .await
            .unwrap();

        // Codes are single-use for checkout too.
        let err = h
            .auth
            .confirm_checkout_code("+8801712345678", &code, "cart-77")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reset_flow_reachable_through_facade() {
        let h = harness();
        let user = registered_user(&h, "asha@example.com").await;

        h.auth
            .request_password_reset("asha@example.com", "device-1")
            .await
            .unwrap();
        let code = h.delivery.last_code().unwrap();

        let grant = h
            .auth
            .confirm_password_reset("asha@example.com", &code, "device-1")
            .await
            .unwrap();

        let (reset_user, pair) = h
            .auth
            .complete_password_reset(&grant.reset_token, "FreshPassword1!", &ClientMeta::default())
            .await
            .unwrap();
        assert_eq!(reset_user.id, user.id);
        assert!(h.auth.refresh(&pair.refresh_token).await.is_ok());
    }
}
