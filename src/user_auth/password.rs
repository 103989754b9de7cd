//! Argon2 password hashing
//!
//! Hashing is CPU-bound, so both operations run on the blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::WalletError;

/// Hash a password into a PHC string.
pub async fn hash_password(password: String) -> Result<String, WalletError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| WalletError::internal(format!("Hashing failed: {}", e)))
    })
    .await
    .map_err(|e| WalletError::internal(format!("Hashing task failed: {}", e)))?
}

/// Check a password against a stored PHC string.
///
/// `Ok(false)` on mismatch; a malformed stored hash is `Internal`.
pub async fn verify_password(password: String, stored: String) -> Result<bool, WalletError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored)
            .map_err(|e| WalletError::internal(format!("Invalid hash format: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| WalletError::internal(format!("Verify task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("abcd1234".to_string()).await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(
            verify_password("abcd1234".to_string(), hash.clone())
                .await
                .unwrap()
        );
        assert!(!verify_password("abcd1235".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_salts_differ() {
        let a = hash_password("abcd1234".to_string()).await.unwrap();
        let b = hash_password("abcd1234".to_string()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_internal() {
        let err = verify_password("abcd1234".to_string(), "not-a-hash".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::Internal(_)));
    }
}
