//! Session Registry
//!
//! One record per issued refresh credential, backing the "logged-in
//! devices" listing and revocation. The authoritative liveness check for a
//! refresh token is: a row exists for its hash and that row has not
//! expired. Termination deletes the row and takes effect immediately.

use chrono::{DateTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::auth::TokenPair;
use crate::models::session::{ClientMeta, DeviceInfo, Session, SessionView};
use crate::models::user::UserRole;
use crate::service::token::TokenService;
use crate::store::SessionStore;
use crate::utils::device::parse_user_agent;
use crate::utils::error::{AppError, AppResult};
use crate::utils::security::hash_sensitive_data;

/// Manages the session registry
#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    /// Swappable User-Agent parser; accuracy is best effort
    ua_parser: fn(&str) -> DeviceInfo,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            ua_parser: parse_user_agent,
        }
    }

    /// Replace the User-Agent parser
    pub fn with_ua_parser(mut self, parser: fn(&str) -> DeviceInfo) -> Self {
        self.ua_parser = parser;
        self
    }

    /// Record a session for a freshly issued refresh credential. Upserts
    /// by token hash, so re-recording the same credential is idempotent.
    pub async fn record(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        refresh_token_hash: &str,
        client: &ClientMeta,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Session> {
        let device = (self.ua_parser)(client.user_agent.as_deref().unwrap_or(""));
        let now = Utc::now();

        let session = Session {
            id: session_id,
            user_id,
            refresh_token_hash: refresh_token_hash.to_string(),
            device: device.device,
            browser: device.browser,
            os: device.os,
            ip_address: client
                .ip
                .as_deref()
                .and_then(|ip| IpNetwork::from_str(ip).ok()),
            location: client.location.clone(),
            created_at: now,
            last_active_at: now,
            expires_at,
        };

        self.store.upsert(session).await
    }

    /// Mint a token pair and record the session it belongs to in one step.
    /// Every login-shaped event (password, OTP, completed reset) goes
    /// through here.
    pub async fn establish(
        &self,
        tokens: &TokenService,
        user_id: Uuid,
        role: UserRole,
        client: &ClientMeta,
    ) -> AppResult<TokenPair> {
        let session_id = Uuid::new_v4();
        let (pair, refresh_expires_at) = tokens.issue_pair(user_id, role, session_id)?;

        self.record(
            session_id,
            user_id,
            &hash_sensitive_data(&pair.refresh_token),
            client,
            refresh_expires_at,
        )
        .await?;

        Ok(pair)
    }

    /// The user's sessions, most recently active first, annotated with
    /// which one is the caller's own.
    pub async fn list(
        &self,
        user_id: Uuid,
        current_session_id: Option<Uuid>,
    ) -> AppResult<Vec<SessionView>> {
        let sessions = self.store.list_for_user(user_id).await?;
        Ok(sessions
            .iter()
            .map(|s| SessionView::from_session(s, current_session_id))
            .collect())
    }

    /// Terminate one session, only if it belongs to `user_id`.
    ///
    /// Absence and foreign ownership answer identically as `NotFound` so
    /// session ids cannot be probed across accounts.
    pub async fn terminate(&self, session_id: Uuid, user_id: Uuid) -> AppResult<()> {
        match self.store.find_by_id(session_id).await? {
            Some(session) if session.user_id == user_id => {
                self.store.delete(session_id).await?;
                Ok(())
            }
            _ => Err(AppError::NotFound("Session not found".to_string())),
        }
    }

    /// Terminate every session for the user except the current one.
    ///
    /// Fails closed: without a determinable current session nothing is
    /// terminated, so a caller can never log itself out by accident.
    pub async fn terminate_all_except(
        &self,
        user_id: Uuid,
        current_session_id: Option<Uuid>,
    ) -> AppResult<u64> {
        let Some(current) = current_session_id else {
            return Err(AppError::Unauthorized(
                "Current session could not be determined".to_string(),
            ));
        };

        self.store.delete_for_user(user_id, Some(current)).await
    }

    /// Terminate every session for the user. Used for trust-boundary
    /// events such as a completed password reset.
    pub async fn terminate_all(&self, user_id: Uuid) -> AppResult<u64> {
        self.store.delete_for_user(user_id, None).await
    }

    /// Look up the live session for a refresh token hash. Expired rows are
    /// deleted on sight and read as absent.
    pub async fn live_session_for_token(&self, token_hash: &str) -> AppResult<Option<Session>> {
        match self.store.find_by_token_hash(token_hash).await? {
            Some(session) if session.is_expired(Utc::now()) => {
                self.store.delete(session.id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Swap a session's refresh credential in place (rotation). The
    /// superseded token's hash no longer matches any row afterwards.
    pub async fn rotate(
        &self,
        session_id: Uuid,
        new_token_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let rotated = self
            .store
            .rotate_token(session_id, new_token_hash, new_expires_at, Utc::now())
            .await?;
        if !rotated {
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        Ok(())
    }

    /// Background sweep for rows past their expiry
    pub async fn purge_expired(&self) -> AppResult<u64> {
        self.store.delete_expired(Utc::now()).await
    }
}
