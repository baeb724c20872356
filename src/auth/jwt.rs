use crate::core::errors::SplitifydError;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const TOKEN_LIFETIME_SECS: u64 = 3600;

/// Identity carried by a bearer token. `sub` is the acting user id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct JwtService {
    secret: String,
}

impl JwtService {
    pub fn new(secret: impl Into<String>) -> Self {
        JwtService { secret: secret.into() }
    }

    /// Issues a one-hour token for `user_id`. Used by local tooling and tests;
    /// production tokens come from the identity provider.
    pub fn generate_token(&self, user_id: &str) -> Result<String, SplitifydError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SplitifydError::InternalServerError(format!("Time error: {}", e)))?;
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now.as_secs() + TOKEN_LIFETIME_SECS) as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| SplitifydError::InternalServerError(format!("JWT encoding error: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, SplitifydError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| SplitifydError::Unauthenticated(format!("Invalid token: {}", e)))?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(SplitifydError::Unauthenticated("token has no subject".to_string()));
        }
        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates() {
        let jwt = JwtService::new("test-secret");
        let token = jwt.generate_token("alice").unwrap();
        let claims = jwt.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = JwtService::new("one").generate_token("alice").unwrap();
        let result = JwtService::new("two").validate_token(&token);
        assert!(matches!(result, Err(SplitifydError::Unauthenticated(_))));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let result = JwtService::new("s").validate_token("not.a.token");
        assert!(matches!(result, Err(SplitifydError::Unauthenticated(_))));
    }
}
