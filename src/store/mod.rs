//! Persistence Collaborator
//!
//! Keyed lookup and upsert over the durable document store, expressed as
//! narrow repository traits so the backend stays substitutable. The crate
//! ships Postgres implementations and in-memory ones for tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::password_reset::PasswordResetToken;
use crate::models::session::Session;
use crate::models::user::{NewUser, UserRecord};
use crate::utils::error::AppResult;

pub use memory::{MemoryResetTokenStore, MemorySessionStore, MemoryUserStore};
pub use postgres::{PgResetTokenStore, PgSessionStore, PgUserStore};

/// Keyed lookup by a normalized identifier: email addresses go through the
/// email index, anything else through the phone index.
pub async fn find_user_by_identifier(
    store: &dyn UserStore,
    identifier: &str,
) -> AppResult<Option<UserRecord>> {
    if identifier.contains('@') {
        store.find_by_email(identifier).await
    } else {
        store.find_by_phone(identifier).await
    }
}

/// Durable storage for user identity records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create an account; fails with `Conflict` when the email or phone is
    /// already registered.
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<UserRecord>>;

    /// Replace the stored password hash
    async fn set_password(&self, id: Uuid, password_hash: &str) -> AppResult<()>;

    /// Mark the account's phone number as verified
    async fn set_phone_verified(&self, id: Uuid) -> AppResult<()>;

    /// Mark the account's email address as verified
    async fn set_email_verified(&self, id: Uuid) -> AppResult<()>;
}

/// Durable storage for session rows, one per live refresh credential
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session keyed by its refresh token hash
    async fn upsert(&self, session: Session) -> AppResult<Session>;

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>>;

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>>;

    /// All sessions for a user, most recently active first
    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Session>>;

    /// Delete one session; returns whether a row existed
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    /// Delete every session for a user except `keep` (all of them when
    /// `keep` is `None`); returns the number removed.
    async fn delete_for_user(&self, user_id: Uuid, keep: Option<Uuid>) -> AppResult<u64>;

    /// Swap a session's token hash and expiry in place (refresh rotation);
    /// also bumps last-active. Returns whether the session still existed.
    async fn rotate_token(
        &self,
        id: Uuid,
        new_token_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Bump a session's last-active timestamp
    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()>;

    /// Remove sessions whose expiry has elapsed; returns the number removed
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Durable storage for password reset tokens
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn insert(&self, token: PasswordResetToken) -> AppResult<()>;

    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<PasswordResetToken>>;

    /// Mark a token used. The update is conditional on the token being
    /// unused, so exactly one concurrent caller observes `true`.
    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool>;

    /// Remove tokens whose expiry has elapsed; returns the number removed
    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;
}
