//! Token Issuer
//!
//! Mints and verifies the signed access/refresh credential pair. Signing
//! secrets live in [`JwtConfig`], loaded once at startup; rotating a secret
//! invalidates every outstanding token of that kind, which is an accepted
//! operational consequence rather than something handled here.
//!
//! Verification checks signature and expiry only. Access tokens are never
//! persisted and expire on their own; refresh tokens must additionally be
//! checked against the session registry by the caller before being honored.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::auth::{AccessTokenClaims, RefreshTokenClaims, TokenPair, UserContext};
use crate::models::user::UserRole;
use crate::utils::error::AppError;

/// Typed verification failures for signed credentials
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("token signature invalid")]
    SignatureInvalid,

    #[error("malformed token")]
    Malformed,

    #[error("token generation failed: {0}")]
    Generation(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Expired("credential expired".to_string()),
            TokenError::SignatureInvalid | TokenError::Malformed => AppError::InvalidCredential,
            TokenError::Generation(msg) => AppError::Internal(msg),
        }
    }
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> TokenError {
    use jsonwebtoken::errors::ErrorKind;
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        _ => TokenError::Malformed,
    }
}

/// JWT issuer/verifier for the access/refresh pair
#[derive(Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_token_expires_in: Duration,
    refresh_token_expires_in: Duration,
}

impl TokenService {
    /// Create a token service from the shared configuration
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_secret: config.access_secret.clone(),
            refresh_secret: config.refresh_secret.clone(),
            access_token_expires_in: Duration::minutes(config.access_token_expires_minutes),
            refresh_token_expires_in: Duration::days(config.refresh_token_expires_days),
        }
    }

    /// Refresh credential lifetime; doubles as the session expiry
    pub fn refresh_token_lifetime(&self) -> Duration {
        self.refresh_token_expires_in
    }

    /// Generate an access token for a user under a session
    pub fn issue_access_token(
        &self,
        user_id: Uuid,
        role: UserRole,
        session_id: Uuid,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessTokenClaims::new(
            user_id,
            role,
            session_id,
            now + self.access_token_expires_in,
            now,
        );
        self.encode(&claims, &self.access_secret)
    }

    /// Generate a refresh token for a user under a session; returns the
    /// token and its expiry.
    pub fn issue_refresh_token(
        &self,
        user_id: Uuid,
        role: UserRole,
        session_id: Uuid,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + self.refresh_token_expires_in;
        let claims = RefreshTokenClaims::new(user_id, role, session_id, expires_at, now);
        Ok((self.encode(&claims, &self.refresh_secret)?, expires_at))
    }

    /// Generate a full access/refresh pair; returns the pair and the
    /// refresh token's expiry.
    pub fn issue_pair(
        &self,
        user_id: Uuid,
        role: UserRole,
        session_id: Uuid,
    ) -> Result<(TokenPair, DateTime<Utc>), TokenError> {
        let access_token = self.issue_access_token(user_id, role, session_id)?;
        let (refresh_token, refresh_expires_at) =
            self.issue_refresh_token(user_id, role, session_id)?;

        Ok((
            TokenPair::new(
                access_token,
                refresh_token,
                self.access_token_expires_in.num_seconds(),
            ),
            refresh_expires_at,
        ))
    }

    /// Decode and validate an access token
    pub fn verify_access(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let claims: AccessTokenClaims = self.decode(token, &self.access_secret)?;
        if claims.token_type != "access" {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    /// Validate an access token and extract the caller's context
    pub fn validate_access_token(&self, token: &str) -> Result<UserContext, TokenError> {
        let claims = self.verify_access(token)?;
        UserContext::from_access_claims(&claims).map_err(|_| TokenError::Malformed)
    }

    /// Decode and validate a refresh token (signature and expiry only;
    /// pair with a session registry lookup before honoring it)
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshTokenClaims, TokenError> {
        let claims: RefreshTokenClaims = self.decode(token, &self.refresh_secret)?;
        if claims.token_type != "refresh" {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    fn encode<T: Serialize>(&self, claims: &T, secret: &str) -> Result<String, TokenError> {
        let header = Header::new(Algorithm::HS256);
        let encoding_key = EncodingKey::from_secret(secret.as_ref());

        encode(&header, claims, &encoding_key).map_err(|e| TokenError::Generation(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, token: &str, secret: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;

        let decoding_key = DecodingKey::from_secret(secret.as_ref());

        decode::<T>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(map_decode_error)
    }
}
