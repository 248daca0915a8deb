//! # JWT Token Management
//!
//! HS256 tokens carrying only the user id and the issue/expiry times.
//! Validation is stateless; the gate re-loads the user afterwards.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing
    pub secret: String,

    /// Token lifetime
    pub ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "CHANGE_THIS_SECRET_IN_PRODUCTION".to_string(),
            ttl: Duration::days(90),
        }
    }
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    /// Create a new JWT manager with the given configuration
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Sign a token for a user, issued now
    pub fn sign(&self, user_id: &str) -> AuthResult<String> {
        self.sign_at(user_id, Utc::now())
    }

    /// Sign a token with an explicit issue time
    pub fn sign_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> AuthResult<String> {
        let claims = JwtClaims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.config.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Verify signature and expiry, returning the claims
    pub fn validate_token(&self, token: &str) -> AuthResult<JwtClaims> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::MalformedToken,
                }
            })?;

        Ok(token_data.claims)
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_manager() -> JwtManager {
        JwtManager::new(JwtConfig {
            secret: "test_secret_key_for_testing_only".to_string(),
            ttl: Duration::days(90),
        })
    }

    #[test]
    fn test_token_generation() {
        let manager = create_test_manager();
        let token = manager.sign("5c8a1d5b0190b214360dc057").unwrap();

        assert!(!token.is_empty());
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_token_validation() {
        let manager = create_test_manager();
        let token = manager.sign("user-1").unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, Duration::days(90).num_seconds());
    }

    #[test]
    fn test_invalid_token() {
        let manager = create_test_manager();
        let result = manager.validate_token("loggedout");
        assert_eq!(result.unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn test_wrong_secret() {
        let manager1 = create_test_manager();
        let manager2 = JwtManager::new(JwtConfig {
            secret: "different_secret".to_string(),
            ttl: Duration::days(90),
        });

        let token = manager1.sign("user-1").unwrap();
        let result = manager2.validate_token(&token);
        assert_eq!(result.unwrap_err(), AuthError::InvalidSignature);
    }

    #[test]
    fn test_expired_token() {
        let manager = JwtManager::new(JwtConfig {
            secret: "test_secret_key_for_testing_only".to_string(),
            ttl: Duration::minutes(5),
        });

        let token = manager
            .sign_at("user-1", Utc::now() - Duration::hours(1))
            .unwrap();
        assert_eq!(manager.validate_token(&token).unwrap_err(), AuthError::TokenExpired);
    }
}
