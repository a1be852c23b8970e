//! Data models and request/response structures

pub mod auth;
pub mod otp;
pub mod password_reset;
pub mod requests;
pub mod session;
pub mod user;

pub use auth::{AccessTokenClaims, RefreshTokenClaims, TokenPair, UserContext};
pub use otp::{OtpChallenge, OtpIssued, OtpOutcome, OtpPolicy, OtpPurpose};
pub use password_reset::PasswordResetToken;
pub use session::{ClientMeta, DeviceInfo, Session, SessionView};
pub use user::{NewUser, User, UserRecord, UserRole};
