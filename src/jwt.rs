use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::entity::UserType;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,    // user id
    pub email: String,
    pub user_type: UserType,
    pub exp: i64,    // expiration time
    pub iat: i64,    // issued at
}

/// Generate a JWT token for a user
pub fn generate_token(
    user_id: i64,
    email: &str,
    user_type: UserType,
    jwt_secret: &str,
    expiration_hours: i64,
) -> Result<String> {
    let now = Utc::now();
    let expiration = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        user_type,
        iat: now.timestamp(),
        exp: expiration.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .map_err(|e| anyhow!("Failed to generate token: {}", e))
}

/// Verify and decode a JWT token
pub fn verify_token(token: &str, jwt_secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| anyhow!("Failed to verify token: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let token = generate_token(7, "m@tawfir.app", UserType::Merchant, "secret", 1).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.email, "m@tawfir.app");
        assert_eq!(claims.user_type, UserType::Merchant);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = generate_token(1, "a@b.c", UserType::Customer, "secret", 1).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = generate_token(1, "a@b.c", UserType::Customer, "secret", -2).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }
}
