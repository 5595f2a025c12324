//! Argon2id password hashing, run off the async runtime.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

// Verified against when the username is unknown, so both paths cost a hash.
const DUMMY_HASH: &str = "$argon2id$v=19$m=15000,t=2,p=1$\
    gZiV/M1gPc22ElAH/Jh1Hw$\
    CWOrkoo7oJBQ/iyh7uJ0LO2aLEfrHwTWllSAxT0zRno";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    Params(argon2::Error),

    #[error("could not process password hash: {0}")]
    Hash(argon2::password_hash::Error),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hash `password` into a PHC string.
pub async fn hash_password(password: Secret<String>) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || compute_password_hash(&password)).await?
}

/// Check `candidate` against `expected`, or against a dummy hash when
/// there is no stored hash. Returns `false` on mismatch or when no hash was stored.
pub async fn verify_password(
    expected: Option<String>,
    candidate: Secret<String>,
) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || {
        let known = expected.is_some();
        let hash = expected.unwrap_or_else(|| DUMMY_HASH.to_string());
        let matches = verify_password_hash(&hash, &candidate)?;
        Ok(known && matches)
    })
    .await?
}

fn compute_password_hash(password: &Secret<String>) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let params = Params::new(15000, 2, 1, None).map_err(PasswordError::Params)?;

    let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let hash = hasher
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(PasswordError::Hash)?;

    Ok(hash.to_string())
}

fn verify_password_hash(hash: &str, candidate: &Secret<String>) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(PasswordError::Hash)?;

    match Argon2::default().verify_password(candidate.expose_secret().as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Hash(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> Secret<String> {
        Secret::new(s.to_string())
    }

    #[tokio::test]
    async fn hashed_password_verifies() {
        let hash = hash_password(secret("correct horse")).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verify_password(Some(hash.clone()), secret("correct horse")).await.unwrap());
        assert!(!verify_password(Some(hash), secret("battery staple")).await.unwrap());
    }

    #[tokio::test]
    async fn missing_hash_never_verifies() {
        assert!(!verify_password(None, secret("anything")).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let result = verify_password(Some("not-a-hash".to_string()), secret("x")).await;
        assert!(matches!(result, Err(PasswordError::Hash(_))));
    }
}
