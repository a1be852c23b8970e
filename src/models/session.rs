//! Session Models
//!
//! One record per live refresh credential, carrying best-effort device
//! descriptors for the "logged-in devices" listing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::ipnetwork::IpNetwork;
use uuid::Uuid;

/// Best-effort device descriptors parsed from a User-Agent string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

/// Request-scoped client metadata captured at the HTTP boundary and
/// attached to session records.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    /// Raw User-Agent header, if any
    pub user_agent: Option<String>,
    /// Origin IP as reported by the proxy headers
    pub ip: Option<String>,
    /// Approximate location, when an upstream geo lookup supplies one
    pub location: Option<String>,
}

/// A live session: the server-side record of one issued refresh credential.
///
/// A session is honored only while `expires_at` has not elapsed and the row
/// still exists; termination is deletion and takes effect immediately.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    /// Unique identifier for the session
    pub id: Uuid,

    /// Account that owns the session
    pub user_id: Uuid,

    /// SHA-256 digest of the refresh token (the token itself is never stored)
    pub refresh_token_hash: String,

    /// Device class (Desktop / Mobile / Tablet), best effort
    pub device: Option<String>,

    /// Browser name, best effort
    pub browser: Option<String>,

    /// Operating system, best effort
    pub os: Option<String>,

    /// Origin IP address
    pub ip_address: Option<IpNetwork>,

    /// Approximate location, if known
    pub location: Option<String>,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When the session was last used
    pub last_active_at: DateTime<Utc>,

    /// When the session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session representation for the devices UI, annotated with whether it is
/// the caller's own session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub ip: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub is_current: bool,
}

impl SessionView {
    pub fn from_session(session: &Session, current_session_id: Option<Uuid>) -> Self {
        Self {
            id: session.id,
            device: session.device.clone(),
            browser: session.browser.clone(),
            os: session.os.clone(),
            ip: session.ip_address.map(|net| net.ip().to_string()),
            location: session.location.clone(),
            created_at: session.created_at,
            last_active_at: session.last_active_at,
            is_current: current_session_id == Some(session.id),
        }
    }
}
