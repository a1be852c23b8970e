//! Postgres Store Implementations
//!
//! Repository implementations over the shared connection pool. Queries are
//! runtime-bound so the crate builds without a live database; the schema
//! lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ResetTokenStore, SessionStore, UserStore};
use crate::models::password_reset::PasswordResetToken;
use crate::models::session::Session;
use crate::models::user::{NewUser, UserRecord};
use crate::utils::error::{AppError, AppResult};

const USER_COLUMNS: &str = "id, name, email, phone, password_hash, role, \
     email_verified, phone_verified, created_at, updated_at";

const SESSION_COLUMNS: &str = "id, user_id, refresh_token_hash, device, browser, os, \
     ip_address, location, created_at, last_active_at, expires_at";

/// [`UserStore`] over Postgres
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord> {
        let query = format!(
            r"
            INSERT INTO users (name, email, phone, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "
        );

        sqlx::query_as::<_, UserRecord>(&query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.phone)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, "An account with this identifier already exists"))
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, UserRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, UserRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE phone = $1");
        Ok(sqlx::query_as::<_, UserRecord>(&query)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_phone_verified(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET phone_verified = TRUE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE users SET email_verified = TRUE, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// [`SessionStore`] over Postgres
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn upsert(&self, session: Session) -> AppResult<Session> {
        let query = format!(
            r"
            INSERT INTO auth_sessions
                (id, user_id, refresh_token_hash, device, browser, os,
                 ip_address, location, created_at, last_active_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (refresh_token_hash) DO UPDATE SET
                last_active_at = EXCLUDED.last_active_at,
                expires_at = EXCLUDED.expires_at
            RETURNING {SESSION_COLUMNS}
            "
        );

        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.refresh_token_hash)
            .bind(&session.device)
            .bind(&session.browser)
            .bind(&session.os)
            .bind(session.ip_address)
            .bind(&session.location)
            .bind(session.created_at)
            .bind(session.last_active_at)
            .bind(session.expires_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        let query = format!("SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE id = $1");
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let query =
            format!("SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE refresh_token_hash = $1");
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions \
             WHERE user_id = $1 ORDER BY last_active_at DESC"
        );
        Ok(sqlx::query_as::<_, Session>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: Uuid, keep: Option<Uuid>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM auth_sessions WHERE user_id = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(user_id)
        .bind(keep)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn rotate_token(
        &self,
        id: Uuid,
        new_token_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r"
            UPDATE auth_sessions
            SET refresh_token_hash = $2, expires_at = $3, last_active_at = $4
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(new_token_hash)
        .bind(new_expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE auth_sessions SET last_active_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// [`ResetTokenStore`] over Postgres
#[derive(Clone)]
pub struct PgResetTokenStore {
    pool: PgPool,
}

impl PgResetTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetTokenStore for PgResetTokenStore {
    async fn insert(&self, token: PasswordResetToken) -> AppResult<()> {
        sqlx::query(
            r"
            INSERT INTO password_reset_tokens
                (id, user_id, token_hash, expires_at, created_at, used_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(token.used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<PasswordResetToken>> {
        Ok(sqlx::query_as::<_, PasswordResetToken>(
            "SELECT id, user_id, token_hash, expires_at, created_at, used_at \
             FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used_at = $2 WHERE id = $1 AND used_at IS NULL",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
