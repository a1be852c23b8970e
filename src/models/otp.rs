//! One-Time-Code Models
//!
//! Challenge records, the closed purpose enum, and the single policy table
//! that scopes TTLs, attempt limits, and send ceilings per purpose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::utils::error::{AppError, AppResult};

/// The closed set of reasons a one-time code may be issued.
///
/// Every rate limit and validity check is scoped by purpose; there is no
/// free-form purpose string anywhere in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    PhoneVerification,
    PasswordReset,
    Login,
    GuestCheckout,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::PhoneVerification => "phone_verification",
            OtpPurpose::PasswordReset => "password_reset",
            OtpPurpose::Login => "login",
            OtpPurpose::GuestCheckout => "guest_checkout",
        }
    }

    /// The policy table: purpose -> { code TTL, attempt limit, send ceilings }.
    ///
    /// Consulted by both the abuse guard and the challenge manager so the
    /// two can never disagree about a purpose's limits.
    pub fn policy(&self) -> OtpPolicy {
        match self {
            OtpPurpose::PhoneVerification => OtpPolicy {
                code_ttl_seconds: 300,
                attempt_limit: 5,
                resend_window_seconds: 60,
                daily_ceiling: 5,
            },
            OtpPurpose::PasswordReset => OtpPolicy {
                code_ttl_seconds: 300,
                attempt_limit: 5,
                resend_window_seconds: 60,
                daily_ceiling: 5,
            },
            OtpPurpose::Login => OtpPolicy {
                code_ttl_seconds: 300,
                attempt_limit: 3,
                resend_window_seconds: 60,
                daily_ceiling: 5,
            },
            OtpPurpose::GuestCheckout => OtpPolicy {
                code_ttl_seconds: 300,
                attempt_limit: 5,
                resend_window_seconds: 60,
                daily_ceiling: 10,
            },
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-purpose limits for code issuance and verification
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    /// How long an issued code stays valid
    pub code_ttl_seconds: u64,
    /// Counted verification attempts a challenge permits before lockout
    pub attempt_limit: i64,
    /// Minimum spacing between sends to the same destination
    pub resend_window_seconds: u64,
    /// Sends permitted per destination per day
    pub daily_ceiling: i64,
}

impl OtpPolicy {
    pub fn code_ttl(&self) -> Duration {
        Duration::from_secs(self.code_ttl_seconds)
    }

    pub fn resend_window(&self) -> Duration {
        Duration::from_secs(self.resend_window_seconds)
    }
}

/// One outstanding one-time code, stored (as JSON) in the cache under its
/// (destination, purpose, session) key. Only the code's digest is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpChallenge {
    /// Normalized phone or email the code was sent to
    pub destination: String,
    /// Why the code was issued
    pub purpose: OtpPurpose,
    /// Caller-supplied correlation id binding the challenge to one client
    pub session_ref: String,
    /// SHA-256 digest of the code
    pub code_hash: String,
    /// When the challenge was created
    pub issued_at: DateTime<Utc>,
    /// When the challenge stops being verifiable
    pub expires_at: DateTime<Utc>,
    /// Set once a verification succeeds; terminal
    pub consumed: bool,
}

impl OtpChallenge {
    /// Check if the challenge has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Cache key for the challenge record
    pub fn cache_key(destination: &str, purpose: OtpPurpose, session_ref: &str) -> String {
        format!("otp:{}:{}:{}", purpose, destination, session_ref)
    }

    /// Cache key for the challenge's atomic attempt counter
    pub fn attempts_key(destination: &str, purpose: OtpPurpose, session_ref: &str) -> String {
        format!("otp:att:{}:{}:{}", purpose, destination, session_ref)
    }
}

/// Opaque confirmation returned from a successful `issue`; never carries
/// the raw code.
#[derive(Debug, Clone, Serialize)]
pub struct OtpIssued {
    pub destination: String,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    pub resend_after_seconds: u64,
}

/// Outcome of a verification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpOutcome {
    /// Code matched; the challenge is now consumed
    Verified,
    /// Code did not match; the attempt was counted
    InvalidCode { attempts: i64 },
    /// Challenge absent or past its TTL
    Expired,
    /// Challenge was already consumed by an earlier verification
    AlreadyUsed,
    /// Attempt limit reached; terminal until a fresh code is issued
    AttemptsExceeded,
}

impl OtpOutcome {
    /// Translate a non-verified outcome onto the error taxonomy, for
    /// callers that gate a follow-up step on verification.
    pub fn into_result(self) -> AppResult<()> {
        match self {
            OtpOutcome::Verified => Ok(()),
            OtpOutcome::InvalidCode { .. } => Err(AppError::InvalidCredential),
            OtpOutcome::Expired => Err(AppError::Expired("verification code expired".to_string())),
            OtpOutcome::AlreadyUsed => {
                Err(AppError::Conflict("verification code already used".to_string()))
            }
            OtpOutcome::AttemptsExceeded => Err(AppError::AttemptsExceeded),
        }
    }
}
