//! User Models
//!
//! Account identity records: normalized email/phone, password hash, role,
//! and verification flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role, stored as text in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(UserRole::Customer),
            "admin" => Ok(UserRole::Admin),
            _ => Err(()),
        }
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Customer
    }
}

/// Database row representation of a user, including the password hash
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn role(&self) -> UserRole {
        UserRole::from_str(&self.role).unwrap_or_default()
    }
}

/// Public user representation; never carries the password hash
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique identifier for the account
    pub id: Uuid,

    /// Display name
    pub name: Option<String>,

    /// Normalized email address, if one is on file
    pub email: Option<String>,

    /// Normalized phone number, if one is on file
    pub phone: Option<String>,

    /// Account role
    pub role: UserRole,

    /// Whether the email address has been verified
    pub email_verified: bool,

    /// Whether the phone number has been verified
    pub phone_verified: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        let role = record.role();
        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            phone: record.phone,
            role,
            email_verified: record.email_verified,
            phone_verified: record.phone_verified,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Data required to create a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(UserRole::from_str("customer"), Ok(UserRole::Customer));
        assert_eq!(UserRole::from_str("admin"), Ok(UserRole::Admin));
        assert_eq!(UserRole::Admin.as_str(), "admin");
        assert!(UserRole::from_str("superuser").is_err());
    }

    #[test]
    fn test_user_from_record_hides_hash_and_parses_role() {
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: Some("Admin".to_string()),
            email: Some("admin@example.com".to_string()),
            phone: None,
            password_hash: Some("$2b$04$abcdefghijklmnopqrstuv".to_string()),
            role: "admin".to_string(),
            email_verified: true,
            phone_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let user: User = record.clone().into();
        assert_eq!(user.id, record.id);
        assert_eq!(user.role, UserRole::Admin);

        // Unknown roles degrade to the least-privileged one.
        let mut odd = record;
        odd.role = "owner".to_string();
        assert_eq!(odd.role(), UserRole::Customer);
    }
}
