//! Bearer-token authentication (HS256 JWT)

use crate::error::{Result, RiskError};
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// User id given to requests when no secret is configured
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated caller, stored in request extensions
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser(pub String);

pub fn issue_token(secret: &str, user_id: &str, ttl: Duration) -> Result<String> {
    if user_id.is_empty() {
        return Err(RiskError::Auth("user id must not be empty".into()));
    }
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| RiskError::Auth(format!("Failed to create token: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| RiskError::Auth(format!("Invalid token: {}", e)))?;

    if data.claims.sub.is_empty() {
        return Err(RiskError::Auth("Invalid token: empty subject".into()));
    }
    Ok(data.claims)
}

/// Token from an `Authorization: Bearer ...` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}
