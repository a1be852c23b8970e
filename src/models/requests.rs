//! Request and Response Models
//!
//! Plain-data shapes exchanged with the HTTP layer. Input structs carry
//! their own validation rules; the services re-check anything that depends
//! on state.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::auth::TokenPair;
use crate::models::session::SessionView;
use crate::models::user::User;
use crate::utils::validation::{email_validator, identifier_validator, phone_validator};

/// Request to create a new account. At least one of email/phone is
/// required; that cross-field rule is enforced by the auth service.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(custom = "email_validator")]
    pub email: Option<String>,

    #[validate(custom = "phone_validator")]
    pub phone: Option<String>,

    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Password-based login with an email or phone identifier
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(custom = "identifier_validator")]
    pub identifier: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Request a one-time code (login, phone verification, reset, checkout)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestCodeRequest {
    #[validate(custom = "identifier_validator")]
    pub destination: String,

    /// Client-generated correlation id binding the challenge to one device
    #[validate(length(min = 1, max = 64))]
    pub session_ref: String,
}

/// Submit a one-time code for verification
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[validate(custom = "identifier_validator")]
    pub destination: String,

    #[validate(length(min = 1, max = 64))]
    pub session_ref: String,

    #[validate(length(equal = 6))]
    pub code: String,
}

/// Request a code for the caller's own account (destination on file)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OwnCodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub session_ref: String,
}

/// Verify a code for the caller's own account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOwnCodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub session_ref: String,

    #[validate(length(equal = 6))]
    pub code: String,
}

/// Exchange a refresh token for a new pair
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// Change the password of an authenticated account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Begin the password reset flow
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetRequestRequest {
    #[validate(custom = "identifier_validator")]
    pub identifier: String,

    #[validate(length(min = 1, max = 64))]
    pub session_ref: String,
}

/// Confirm the reset code and obtain a reset token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetConfirmRequest {
    #[validate(custom = "identifier_validator")]
    pub identifier: String,

    #[validate(length(min = 1, max = 64))]
    pub session_ref: String,

    #[validate(length(equal = 6))]
    pub code: String,
}

/// Commit a new password using a reset token
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetCompleteRequest {
    #[validate(length(min = 1, max = 128))]
    pub reset_token: String,

    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Successful authentication: the account plus a fresh token pair
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}

/// Success-shaped acknowledgement for code requests. Returned whether or
/// not the identifier resolved to an account.
#[derive(Debug, Clone, Serialize)]
pub struct CodeRequestedResponse {
    pub message: String,
    pub expires_in: u64,
    pub resend_after: u64,
}

/// A verified reset code exchanged for a single-use reset token
#[derive(Debug, Clone, Serialize)]
pub struct ResetConfirmResponse {
    pub reset_token: String,
    pub expires_in: u64,
    pub user: User,
}

/// Generic message acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The caller's live sessions, most recently active first
#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

/// Result of a bulk session termination
#[derive(Debug, Clone, Serialize)]
pub struct SessionsTerminatedResponse {
    pub terminated: u64,
}
