//! Security Utilities
//!
//! Password hashing, code/token generation, and digest helpers shared by the
//! OTP, session, and password-reset services.

use bcrypt::{hash, verify, DEFAULT_COST};
use rand::{distributions::Alphanumeric, Rng};

/// Default bcrypt cost for password hashing
pub const DEFAULT_BCRYPT_COST: u32 = DEFAULT_COST;

/// Length of the opaque password-reset credential handed to clients
pub const RESET_TOKEN_LENGTH: usize = 48;

/// Generate a cryptographically secure random alphanumeric string.
///
/// `rand::thread_rng` is a CSPRNG, so the output is suitable for opaque
/// credentials such as password-reset tokens.
pub fn generate_secure_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a 6-digit numeric one-time code
pub fn generate_otp_code() -> String {
    rand::thread_rng().gen_range(100000..=999999).to_string()
}

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash_password_with_cost(password, DEFAULT_BCRYPT_COST)
}

/// Hash a password with custom bcrypt cost
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// SHA-256 digest of sensitive data (codes, refresh tokens, reset tokens)
/// for storage. The plaintext never reaches a durable store.
pub fn hash_sensitive_data(data: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Timing-safe string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }
    result == 0
}
