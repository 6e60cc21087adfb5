use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Role, UserSummary};

/// Claims
///
/// The payload signed into every session token. Produced once by the verifier and
/// handed to handlers as a typed value; nothing downstream re-parses the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's primary key.
    pub sub: i64,
    pub username: String,
    pub role: Role,
    /// Issued At (iat), seconds since the epoch.
    pub iat: i64,
    /// Expiration Time (exp), seconds since the epoch. Rejected once `now >= exp`.
    pub exp: i64,
}

/// Why a token was not accepted (or could not be produced).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    /// Bad signature, malformed token or unexpected claims
    #[error("invalid token: {0}")]
    Invalid(String),

    /// Well-formed and correctly signed, but past its expiry
    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Mint a token for `user` valid for `ttl` from the current time.
pub fn issue(user: &UserSummary, secret: &str, ttl: Duration) -> Result<String, TokenError> {
    issue_at(user, secret, ttl, Utc::now())
}

/// Mint a token as if the current time were `now`.
pub fn issue_at(
    user: &UserSummary,
    secret: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, TokenError> {
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| TokenError::Signing(format!("token lifetime {ttl} out of range")))?;

    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Validate a token against the current time.
pub fn verify(token: &str, secret: &str) -> Result<Claims, TokenError> {
    verify_at(token, secret, Utc::now())
}

/// Validate a token as if the current time were `now`.
///
/// The signature is checked first, so a forged token never reports `Expired`.
pub fn verify_at(token: &str, secret: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is compared below against the injected clock, with no leeway.
    validation.validate_exp = false;
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid(e.to_string()),
    })?;

    if now.timestamp() >= data.claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(data.claims)
}
