use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session token lifetime in hours
const TOKEN_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // User ID
    exp: i64,    // Expiration time
    iat: i64,    // Issued at
}

/// Create a session JWT for a user
pub fn create_token(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    let now = Utc::now();
    let exp = now + Duration::hours(TOKEN_HOURS);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify a JWT and extract the user ID
pub fn verify_token(secret: &str, token: &str) -> anyhow::Result<Uuid> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    let user_id = Uuid::parse_str(&token_data.claims.sub)?;
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let secret = "test_secret";
        let user_id = Uuid::new_v4();

        let token = create_token(secret, user_id).unwrap();
        let extracted_id = verify_token(secret, &token).unwrap();

        assert_eq!(user_id, extracted_id);
    }

    #[test]
    fn test_invalid_token() {
        let secret = "test_secret";
        let result = verify_token(secret, "invalid_token");
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token("secret_a", Uuid::new_v4()).unwrap();
        assert!(verify_token("secret_b", &token).is_err());
    }
}
