use argon2::{password_hash::{PasswordHasher, PasswordVerifier, SaltString}, Argon2, PasswordHash};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;

use super::errors::AuthError;

// Hash verified against when the identifier matches nobody, so unknown and
// known users cost the same.
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash("dummy-password-for-timing").ok());

/// Salted Argon2 PHC string. Two calls with the same input differ.
pub fn hash(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::HashError(e.to_string()))
}

/// `false` on mismatch and on a hash that does not parse.
pub fn verify(plain: &str, hashed: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default().verify_password(plain.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Burn one verification; the result is always discarded.
pub fn verify_dummy(plain: &str) {
    if let Some(h) = DUMMY_HASH.as_deref() {
        let _ = verify(plain, h);
    }
}
