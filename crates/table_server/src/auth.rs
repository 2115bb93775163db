use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::domain::UserId;

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Identity recorded for a username signing in through `provider`.
pub fn user_id_for(provider: &str, username: &str) -> UserId {
    UserId(format!("{provider}:{username}"))
}

pub fn mint_token(cfg: &TokenConfig, user_id: &UserId) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let exp = now + Duration::seconds(cfg.ttl_seconds);
    let claims = Claims {
        sub: user_id.0.clone(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
}

/// Returns the signed-in user when `token` carries a valid, unexpired signature.
pub fn verify_token(cfg: &TokenConfig, token: &str) -> Result<UserId, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(UserId(data.claims.sub))
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
