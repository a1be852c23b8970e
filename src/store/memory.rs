//! In-Memory Store Implementations
//!
//! Map-backed repositories for tests and local development. Behavior
//! mirrors the Postgres implementations, including conflict detection and
//! conditional single-use consumption.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{ResetTokenStore, SessionStore, UserStore};
use crate::models::password_reset::PasswordResetToken;
use crate::models::session::Session;
use crate::models::user::{NewUser, UserRecord};
use crate::utils::error::{AppError, AppResult};

fn poisoned() -> AppError {
    AppError::Internal("store mutex poisoned".to_string())
}

/// [`UserStore`] over a process-local map
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: NewUser) -> AppResult<UserRecord> {
        let mut users = self.users.lock().map_err(|_| poisoned())?;

        let duplicate = users.values().any(|existing| {
            (user.email.is_some() && existing.email == user.email)
                || (user.phone.is_some() && existing.phone == user.phone)
        });
        if duplicate {
            return Err(AppError::Conflict(
                "An account with this identifier already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            password_hash: user.password_hash,
            role: user.role.as_str().to_string(),
            email_verified: false,
            phone_verified: false,
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<UserRecord>> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_phone(&self, phone: &str) -> AppResult<Option<UserRecord>> {
        let users = self.users.lock().map_err(|_| poisoned())?;
        Ok(users
            .values()
            .find(|u| u.phone.as_deref() == Some(phone))
            .cloned())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> AppResult<()> {
        let mut users = self.users.lock().map_err(|_| poisoned())?;
        if let Some(user) = users.get_mut(&id) {
            user.password_hash = Some(password_hash.to_string());
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_phone_verified(&self, id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().map_err(|_| poisoned())?;
        if let Some(user) = users.get_mut(&id) {
            user.phone_verified = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_email_verified(&self, id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().map_err(|_| poisoned())?;
        if let Some(user) = users.get_mut(&id) {
            user.email_verified = true;
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

/// [`SessionStore`] over a process-local map
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn upsert(&self, session: Session) -> AppResult<Session> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;

        if let Some(existing) = sessions
            .values_mut()
            .find(|s| s.refresh_token_hash == session.refresh_token_hash)
        {
            existing.last_active_at = session.last_active_at;
            existing.expires_at = session.expires_at;
            return Ok(existing.clone());
        }

        sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Session>> {
        let sessions = self.sessions.lock().map_err(|_| poisoned())?;
        Ok(sessions.get(&id).cloned())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> AppResult<Option<Session>> {
        let sessions = self.sessions.lock().map_err(|_| poisoned())?;
        Ok(sessions
            .values()
            .find(|s| s.refresh_token_hash == token_hash)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        let sessions = self.sessions.lock().map_err(|_| poisoned())?;
        let mut rows: Vec<Session> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        Ok(sessions.remove(&id).is_some())
    }

    async fn delete_for_user(&self, user_id: Uuid, keep: Option<Uuid>) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        let before = sessions.len();
        sessions.retain(|id, s| s.user_id != user_id || keep == Some(*id));
        Ok((before - sessions.len()) as u64)
    }

    async fn rotate_token(
        &self,
        id: Uuid,
        new_token_hash: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        match sessions.get_mut(&id) {
            Some(session) => {
                session.refresh_token_hash = new_token_hash.to_string();
                session.expires_at = new_expires_at;
                session.last_active_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        if let Some(session) = sessions.get_mut(&id) {
            session.last_active_at = now;
        }
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut sessions = self.sessions.lock().map_err(|_| poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}

/// [`ResetTokenStore`] over a process-local map
#[derive(Debug, Default)]
pub struct MemoryResetTokenStore {
    tokens: Mutex<HashMap<Uuid, PasswordResetToken>>,
}

impl MemoryResetTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn insert(&self, token: PasswordResetToken) -> AppResult<()> {
        let mut tokens = self.tokens.lock().map_err(|_| poisoned())?;
        tokens.insert(token.id, token);
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<PasswordResetToken>> {
        let tokens = self.tokens.lock().map_err(|_| poisoned())?;
        Ok(tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn consume(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<bool> {
        let mut tokens = self.tokens.lock().map_err(|_| poisoned())?;
        match tokens.get_mut(&id) {
            Some(token) if token.used_at.is_none() => {
                token.used_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut tokens = self.tokens.lock().map_err(|_| poisoned())?;
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}
