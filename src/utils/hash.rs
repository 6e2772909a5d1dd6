// src/utils/hash.rs

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use subtle::ConstantTimeEq;

use crate::error::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Checks a login password against a stored value.
///
/// Candidate passwords are optional: an empty stored value accepts any input.
/// Values that are not argon2 hashes are compared verbatim in constant time,
/// which covers rows imported before hashing was applied.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, AppError> {
    if stored.is_empty() {
        return Ok(true);
    }

    let Ok(parsed_hash) = PasswordHash::new(stored) else {
        tracing::debug!("Stored password is not an argon2 hash; comparing as plain text");
        return Ok(password.as_bytes().ct_eq(stored.as_bytes()).into());
    };

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// True when `stored` is a plain-text password that should be replaced by a
/// hash after the next successful login.
pub fn needs_rehash(stored: &str) -> bool {
    !stored.is_empty() && PasswordHash::new(stored).is_err()
}

/// Hashes `password` unless it is empty.
pub fn hash_optional(password: &str) -> Result<String, AppError> {
    if password.is_empty() {
        Ok(String::new())
    } else {
        hash_password(password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("scout123").unwrap();
        assert!(verify_password("scout123", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn empty_stored_password_accepts_anything() {
        assert!(verify_password("", "").unwrap());
        assert!(verify_password("whatever", &hash_optional("").unwrap()).unwrap());
    }

    #[test]
    fn plain_text_values_compare_exactly_and_need_rehash() {
        assert!(verify_password("12345678", "12345678").unwrap());
        assert!(!verify_password("1234567", "12345678").unwrap());
        assert!(!verify_password("123456789", "12345678").unwrap());

        assert!(needs_rehash("12345678"));
        assert!(!needs_rehash(""));
        assert!(!needs_rehash(&hash_password("12345678").unwrap()));
    }
}
