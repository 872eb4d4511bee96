//! Authentication utilities
//!
//! Provides:
//! - API key generation for organizations
//! - Token issuance/validation scaffolding (configured but not wired into any
//!   route; kept intentionally disabled)

use crate::errors::{AppError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new URL-safe API key for an organization
pub fn generate_api_key() -> String {
    let random_bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Claims for internally issued tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (organization id)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Issues and validates internally signed access tokens
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expire_minutes: i64,
}

impl TokenManager {
    /// Create a new token manager with the given signing secret
    pub fn new(secret: &str, expire_minutes: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expire_minutes: expire_minutes as i64,
        }
    }

    /// Issue an access token for an organization
    pub fn issue(&self, organization_id: Uuid) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.expire_minutes);

        let claims = TokenClaims {
            sub: organization_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to issue token: {}", e),
        })
    }

    /// Validate and decode an access token
    pub fn validate(&self, token: &str) -> Result<TokenClaims> {
        decode::<TokenClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthenticated,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_api_key_shape() {
        let key = generate_api_key();
        // 32 random bytes, base64url without padding
        assert_eq!(key.len(), 43);
        assert!(!key.contains('+'));
        assert!(!key.contains('/'));
        assert!(!key.contains('='));
    }

    #[test]
    fn test_api_keys_never_collide() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let key = generate_api_key();
            assert!(!key.is_empty());
            assert!(seen.insert(key), "generated a duplicate API key");
        }
    }

    #[test]
    fn test_token_roundtrip() {
        let manager = TokenManager::new("test_secret", 30);
        let org_id = Uuid::new_v4();

        let token = manager.issue(org_id).unwrap();
        let claims = manager.validate(&token).unwrap();

        assert_eq!(claims.sub, org_id.to_string());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_bad_secret_rejected() {
        let issuer = TokenManager::new("secret_a", 30);
        let verifier = TokenManager::new("secret_b", 30);

        let token = issuer.issue(Uuid::new_v4()).unwrap();
        assert!(verifier.validate(&token).is_err());
    }
}
