//! Configuration Module
//!
//! Centralized configuration for the service. Everything is loaded from the
//! environment exactly once at startup into an explicit struct and passed
//! by reference into the service constructors; there are no ambient lookups
//! after boot.

use anyhow::{bail, Context};

use crate::database::DatabaseConfig;

/// Environment variable helpers
pub mod env {
    use std::env;

    /// Get environment variable as string with default
    pub fn get_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get environment variable as u16 with default
    pub fn get_u16(key: &str, default: u16) -> u16 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as u32 with default
    pub fn get_u32(key: &str, default: u32) -> u32 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Get environment variable as i64 with default
    pub fn get_i64(key: &str, default: i64) -> i64 {
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Check if environment variable is set
    pub fn is_set(key: &str) -> bool {
        env::var(key).is_ok()
    }
}

/// Application configuration combining all service configurations
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT signing configuration
    pub jwt: JwtConfig,

    /// Password hashing and reset token settings
    pub security: SecurityConfig,

    /// SMTP delivery configuration, when email codes are enabled
    pub smtp: Option<SmtpConfig>,

    /// SMS gateway configuration, when phone codes are enabled
    pub sms: Option<SmsConfig>,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// JWT configuration. Both secrets are loaded once at startup; rotating
/// either invalidates every outstanding token of that kind.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_expires_minutes: i64,
    pub refresh_token_expires_days: i64,
}

/// Password hashing and reset token settings
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
    pub reset_token_expires_minutes: i64,
}

/// SMTP delivery configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
}

/// SMS gateway configuration
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub endpoint: String,
    pub api_key: String,
    pub sender_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: env::get_string("SERVER_HOST", "0.0.0.0"),
            port: env::get_u16("SERVER_PORT", 3000),
        }
    }
}

impl JwtConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            access_secret: std::env::var("JWT_ACCESS_SECRET")
                .context("JWT_ACCESS_SECRET environment variable is required")?,
            refresh_secret: std::env::var("JWT_REFRESH_SECRET")
                .context("JWT_REFRESH_SECRET environment variable is required")?,
            access_token_expires_minutes: env::get_i64("JWT_ACCESS_EXPIRES_MINUTES", 15),
            refresh_token_expires_days: env::get_i64("JWT_REFRESH_EXPIRES_DAYS", 7),
        })
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: env::get_u32(
                "BCRYPT_COST",
                crate::utils::security::DEFAULT_BCRYPT_COST,
            ),
            reset_token_expires_minutes: env::get_i64("RESET_TOKEN_EXPIRES_MINUTES", 15),
        }
    }
}

impl SmtpConfig {
    pub fn from_env() -> Option<Self> {
        if !env::is_set("SMTP_HOST") {
            return None;
        }

        Some(Self {
            host: env::get_string("SMTP_HOST", "localhost"),
            port: env::get_u16("SMTP_PORT", 587),
            username: env::get_string("SMTP_USERNAME", ""),
            password: env::get_string("SMTP_PASSWORD", ""),
            from_name: env::get_string("SMTP_FROM_NAME", "Commerce Auth"),
            from_email: env::get_string("SMTP_FROM_EMAIL", "no-reply@localhost"),
        })
    }
}

impl SmsConfig {
    pub fn from_env() -> Option<Self> {
        if !env::is_set("SMS_GATEWAY_URL") {
            return None;
        }

        Some(Self {
            endpoint: env::get_string("SMS_GATEWAY_URL", ""),
            api_key: env::get_string("SMS_GATEWAY_API_KEY", ""),
            sender_id: env::get_string("SMS_SENDER_ID", "SHOP"),
        })
    }
}

impl AppConfig {
    /// Load complete application configuration from environment
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::from_env()
                .context("DATABASE_URL environment variable is required")?,
            jwt: JwtConfig::from_env()?,
            security: SecurityConfig::default(),
            smtp: SmtpConfig::from_env(),
            sms: SmsConfig::from_env(),
        })
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            bail!("Server port must be greater than 0");
        }

        if self.database.max_connections == 0 {
            bail!("Database max_connections must be greater than 0");
        }

        if self.jwt.access_secret.is_empty() || self.jwt.refresh_secret.is_empty() {
            bail!("JWT secrets cannot be empty");
        }

        if self.jwt.access_secret == self.jwt.refresh_secret {
            bail!("JWT access and refresh secrets must be different");
        }

        if self.jwt.access_token_expires_minutes <= 0 || self.jwt.refresh_token_expires_days <= 0 {
            bail!("Token lifetimes must be positive");
        }

        if !(4..=31).contains(&self.security.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }

        if self.smtp.is_none() && self.sms.is_none() {
            log::warn!("no SMTP or SMS gateway configured; one-time codes cannot be delivered");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            database: DatabaseConfig::default(),
            jwt: JwtConfig {
                access_secret: "access".to_string(),
                refresh_secret: "refresh".to_string(),
                access_token_expires_minutes: 15,
                refresh_token_expires_days: 7,
            },
            security: SecurityConfig {
                bcrypt_cost: 12,
                reset_token_expires_minutes: 15,
            },
            smtp: None,
            sms: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_identical_secrets_rejected() {
        let mut config = test_config();
        config.jwt.refresh_secret = config.jwt.access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_bcrypt_cost_rejected() {
        let mut config = test_config();
        config.security.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_helpers() {
        assert_eq!(env::get_u16("NONEXISTENT_U16", 42), 42);
        assert_eq!(env::get_string("NONEXISTENT_STRING", "default"), "default");
        assert!(!env::is_set("NONEXISTENT_FLAG"));
    }
}
