//! Bearer-token issuance and verification. Tokens are HS256 JWTs carrying the
//! user identity plus a paired CSRF secret that protected mutating routes must
//! echo back in `X-CSRF-Token`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Role,
};

const ISSUER: &str = "storefront-api";
const AUDIENCE: [&str; 2] = ["storefront-web", "storefront-mobile"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub csrf_token: String,
    pub iss: String,
    pub sub: String,
    pub aud: Vec<String>,
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub csrf_token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
}

/// Cryptographically random bytes rendered as lowercase hex.
pub fn random_hex(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Recovery codes are 16 random bytes, so 32 hex characters on the wire.
pub fn generate_recovery_code() -> String {
    random_hex(16)
}

pub fn issue(
    secret: &str,
    expiry_hours: i64,
    user_id: Uuid,
    email: &str,
    role: Role,
) -> AppResult<IssuedToken> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(expiry_hours);
    let csrf_token = random_hex(32);

    let claims = Claims {
        user_id,
        email: email.to_string(),
        role,
        csrf_token: csrf_token.clone(),
        iss: ISSUER.to_string(),
        sub: user_id.to_string(),
        aud: AUDIENCE.iter().map(|a| a.to_string()).collect(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        nbf: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to sign token: {e}")))?;

    Ok(IssuedToken {
        token,
        csrf_token,
        expires_at,
        expires_in: (expires_at - now).num_seconds(),
    })
}

pub fn verify(secret: &str, token: &str) -> AppResult<Claims> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&AUDIENCE);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_tokens_round_trip() {
        let user_id = Uuid::new_v4();
        let issued = issue(SECRET, 24, user_id, "a@example.com", Role::User).unwrap();
        let claims = verify(SECRET, &issued.token).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.csrf_token, issued.csrf_token);
        assert_eq!(claims.sub, user_id.to_string());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issued = issue(SECRET, 24, Uuid::new_v4(), "a@example.com", Role::User).unwrap();
        assert!(verify("other-secret", &issued.token).is_err());
    }

    #[test]
    fn csrf_secret_is_64_hex_chars() {
        let issued = issue(SECRET, 1, Uuid::new_v4(), "a@example.com", Role::Admin).unwrap();
        assert_eq!(issued.csrf_token.len(), 64);
        assert!(issued.csrf_token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn recovery_codes_are_32_hex_chars() {
        let code = generate_recovery_code();
        assert_eq!(code.len(), 32);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(code, generate_recovery_code());
    }
}
