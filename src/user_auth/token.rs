//! Session tokens: HS256 JWT carrying the user id

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::core_types::UserId;
use crate::error::WalletError;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // user_id as string
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    /// Caller identity carried by the token
    pub fn user_id(&self) -> Result<UserId, WalletError> {
        self.sub.parse().map_err(|_| WalletError::Unauthorized)
    }
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: TimeDelta,
}

impl TokenService {
    pub fn new(secret: &str, ttl: TimeDelta) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Issue a token for `user_id`
    pub fn issue(&self, user_id: UserId) -> Result<String, WalletError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + self.ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| WalletError::internal(format!("Failed to generate token: {}", e)))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, WalletError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| WalletError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenService::new("secret", TimeDelta::minutes(10));
        let token = tokens.issue(42).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenService::new("secret", TimeDelta::minutes(10))
            .issue(42)
            .unwrap();
        let other = TokenService::new("other", TimeDelta::minutes(10));
        assert_eq!(other.verify(&token).unwrap_err(), WalletError::Unauthorized);
    }

    #[test]
    fn test_expired_token_rejected() {
        // beyond the default 60s leeway
        let tokens = TokenService::new("secret", TimeDelta::minutes(-5));
        let token = tokens.issue(42).unwrap();
        assert_eq!(tokens.verify(&token).unwrap_err(), WalletError::Unauthorized);
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = TokenService::new("secret", TimeDelta::minutes(10));
        assert!(tokens.verify("not.a.jwt").is_err());
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = Claims {
            sub: "admin".into(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.user_id(), Err(WalletError::Unauthorized));
    }
}
