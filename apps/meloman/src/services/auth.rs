//! Authentication service for Meloman.
//!
//! Provides password hashing with Argon2 and signed session tokens.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Claims stored in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i64,
    /// User email at login time
    pub email: String,
    /// Expiration timestamp (Unix time)
    pub exp: usize,
    /// Issued at timestamp (Unix time)
    pub iat: usize,
}

/// Session lifetime in seconds (7 days), matching the cookie max-age.
pub const SESSION_TTL_SECS: usize = 7 * 24 * 60 * 60;

/// Dummy hash for timing attack prevention.
/// This is a valid Argon2 hash that will always fail verification.
pub const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nYXR0YWNr$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Authentication service handling password hashing and session tokens.
pub struct AuthService {
    session_secret: String,
    argon2: Argon2<'static>,
}

impl AuthService {
    /// Creates a new AuthService with the given signing secret.
    pub fn new(session_secret: String) -> Self {
        Self {
            session_secret,
            argon2: Argon2::default(),
        }
    }

    /// Hashes a password using Argon2.
    ///
    /// Returns the PHC-formatted hash string.
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Verifies a password against a stored hash.
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash format: {}", e)))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Checks a login attempt; `stored_hash` is `None` for unknown emails.
    ///
    /// Unknown emails still pay for one verification so both paths take
    /// roughly the same time.
    pub fn check_login(&self, password: &str, stored_hash: Option<&str>) -> bool {
        match stored_hash {
            Some(hash) => self.verify_password(password, hash).unwrap_or(false),
            None => {
                let _ = self.verify_password(password, DUMMY_HASH);
                false
            }
        }
    }

    /// Creates a session token for the given user.
    pub fn create_token(&self, user_id: i64, email: &str) -> Result<String> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| AppError::Internal(format!("System time error: {}", e)))?
            .as_secs() as usize;

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            exp: now + SESSION_TTL_SECS,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.session_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token creation failed: {}", e)))
    }

    /// Verifies a session token and returns the claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.session_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            AppError::Unauthorized
        })?;

        Ok(token_data.claims)
    }
}
