use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub role: String,
    pub exp: i64,
}

/// One hour, the hosted service's default.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 60;

pub fn create_token(user_id: Uuid, email: &str, secret: &str, ttl: Duration) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or(AppError::InternalError)?
        .timestamp();

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: "authenticated".to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Authentication("Failed to create access token".to_string()))
}

/// Verify an access token and return the caller's id
pub fn verify_access_token(token: &str, secret: &str) -> Result<Uuid> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Authentication("JWT expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid token".to_string()),
    })?;

    Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized("Invalid token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_yields_subject() {
        let user_id = Uuid::new_v4();
        let ttl = Duration::minutes(ACCESS_TOKEN_TTL_MINUTES);
        let token = create_token(user_id, "a@example.com", "secret", ttl).unwrap();

        assert_eq!(verify_access_token(&token, "secret").unwrap(), user_id);
        assert!(verify_access_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_is_an_auth_error() {
        let token = create_token(Uuid::new_v4(), "a@example.com", "secret", Duration::hours(-2)).unwrap();

        assert!(matches!(
            verify_access_token(&token, "secret"),
            Err(AppError::Authentication(_))
        ));
    }
}
