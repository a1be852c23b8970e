//! Password Reset Flow
//!
//! Three gated steps: request a code, exchange a verified code for a
//! single-use reset token, then commit the new password. A completed reset
//! is treated as a trust-boundary event: every outstanding session for the
//! account is terminated before the user is logged back in fresh.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::auth::TokenPair;
use crate::models::otp::{OtpIssued, OtpPurpose};
use crate::models::password_reset::PasswordResetToken;
use crate::models::session::ClientMeta;
use crate::models::user::User;
use crate::service::otp::OtpService;
use crate::service::session::SessionService;
use crate::service::token::TokenService;
use crate::store::{find_user_by_identifier, ResetTokenStore, UserStore};
use crate::utils::error::{AppError, AppResult};
use crate::utils::security::{
    generate_secure_token, hash_password_with_cost, hash_sensitive_data, RESET_TOKEN_LENGTH,
};
use crate::utils::validation::normalize_identifier;

/// A verified code exchanged for a short-lived reset credential
#[derive(Debug, Clone)]
pub struct ResetGrant {
    /// Opaque single-use token; only its digest is persisted
    pub reset_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Orchestrates the OTP manager and token issuer into the reset flow
#[derive(Clone)]
pub struct PasswordResetService {
    users: Arc<dyn UserStore>,
    reset_tokens: Arc<dyn ResetTokenStore>,
    otp: Arc<OtpService>,
    sessions: SessionService,
    tokens: TokenService,
    bcrypt_cost: u32,
    reset_token_ttl_minutes: i64,
}

impl PasswordResetService {
    pub fn new(
        users: Arc<dyn UserStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        otp: Arc<OtpService>,
        sessions: SessionService,
        tokens: TokenService,
        bcrypt_cost: u32,
        reset_token_ttl_minutes: i64,
    ) -> Self {
        Self {
            users,
            reset_tokens,
            otp,
            sessions,
            tokens,
            bcrypt_cost,
            reset_token_ttl_minutes,
        }
    }

    /// Step 1: send a reset code.
    ///
    /// The response shape never reveals whether the identifier resolves to
    /// an account; unknown identifiers still burn the same send budget so
    /// rate-limit behavior is no oracle either.
    pub async fn request_reset(
        &self,
        identifier: &str,
        session_ref: &str,
    ) -> AppResult<OtpIssued> {
        let destination = normalize_identifier(identifier);

        match find_user_by_identifier(self.users.as_ref(), &destination).await? {
            Some(_) => {
                self.otp
                    .issue(&destination, OtpPurpose::PasswordReset, session_ref)
                    .await
            }
            None => {
                self.otp
                    .admit_send(&destination, OtpPurpose::PasswordReset)
                    .await?;
                let policy = self.otp.policy(OtpPurpose::PasswordReset);
                Ok(OtpIssued {
                    destination,
                    purpose: OtpPurpose::PasswordReset,
                    expires_at: Utc::now()
                        + ChronoDuration::seconds(policy.code_ttl_seconds as i64),
                    resend_after_seconds: policy.resend_window_seconds,
                })
            }
        }
    }

    /// Step 2: exchange a verified code for a single-use reset token.
    pub async fn confirm_code(
        &self,
        identifier: &str,
        code: &str,
        session_ref: &str,
    ) -> AppResult<ResetGrant> {
        let destination = normalize_identifier(identifier);

        self.otp
            .verify(&destination, OtpPurpose::PasswordReset, session_ref, code)
            .await?
            .into_result()?;

        let user = find_user_by_identifier(self.users.as_ref(), &destination)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let raw_token = generate_secure_token(RESET_TOKEN_LENGTH);
        let now = Utc::now();
        let record = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token_hash: hash_sensitive_data(&raw_token),
            expires_at: now + ChronoDuration::minutes(self.reset_token_ttl_minutes),
            created_at: now,
            used_at: None,
        };
        self.reset_tokens.insert(record.clone()).await?;

        Ok(ResetGrant {
            reset_token: raw_token,
            expires_at: record.expires_at,
            user: user.into(),
        })
    }

    /// Step 3: commit the new password.
    ///
    /// The token is consumed by a conditional update, so exactly one of
    /// any concurrent callers wins; everyone else sees `Conflict`. All
    /// outstanding sessions are terminated before the fresh login.
    pub async fn complete(
        &self,
        reset_token: &str,
        new_password: &str,
        client: &ClientMeta,
    ) -> AppResult<(User, TokenPair)> {
        if new_password.len() < 8 || new_password.len() > 128 {
            return Err(AppError::Validation(
                "Password must be between 8 and 128 characters".to_string(),
            ));
        }

        let record = self
            .reset_tokens
            .find_by_hash(&hash_sensitive_data(reset_token))
            .await?
            .ok_or_else(|| AppError::NotFound("Reset token not found".to_string()))?;

        if record.is_expired() {
            return Err(AppError::Expired("reset token expired".to_string()));
        }
        if record.is_used() || !self.reset_tokens.consume(record.id, Utc::now()).await? {
            return Err(AppError::Conflict(
                "Reset token already used".to_string(),
            ));
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        let password_hash = hash_password_with_cost(new_password, self.bcrypt_cost)?;
        self.users.set_password(user.id, &password_hash).await?;

        let terminated = self.sessions.terminate_all(user.id).await?;
        if terminated > 0 {
            log::info!(
                "password reset terminated {} session(s) for user {}",
                terminated,
                user.id
            );
        }

        let pair = self
            .sessions
            .establish(&self.tokens, user.id, user.role(), client)
            .await?;

        Ok((user.into(), pair))
    }

    /// Background sweep for expired reset tokens
    pub async fn purge_expired(&self) -> AppResult<u64> {
        self.reset_tokens.delete_expired(Utc::now()).await
    }
}
