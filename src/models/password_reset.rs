//! Password Reset Token Model
//!
//! Short-lived, single-use credentials minted only after a verified
//! `password_reset` code.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Database row for a password reset token. Only the SHA-256 digest of the
/// opaque value handed to the client is stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    /// Check if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Check if the token has already been consumed
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_token(expires_in_minutes: i64) -> PasswordResetToken {
        PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "digest".to_string(),
            expires_at: Utc::now() + Duration::minutes(expires_in_minutes),
            created_at: Utc::now(),
            used_at: None,
        }
    }

    #[test]
    fn test_expiry() {
        assert!(!sample_token(15).is_expired());
        assert!(sample_token(-1).is_expired());
    }

    #[test]
    fn test_single_use_marker() {
        let mut token = sample_token(15);
        assert!(!token.is_used());

        token.used_at = Some(Utc::now());
        assert!(token.is_used());
    }
}
