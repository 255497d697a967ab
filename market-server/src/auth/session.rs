//! JWT session tokens: short-lived access tokens and rotating refresh tokens
//!
//! Access and refresh tokens are signed with separate secrets. Refresh tokens
//! carry the account's `refresh_generation` at issue time: bumping the
//! generation (password change/reset) invalidates every outstanding refresh
//! token at once. Each refresh token also carries a unique `jti` so a single
//! session can be revoked on logout without touching the others.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::Role;

pub const ACCESS_TTL_SECS: i64 = 15 * 60;
pub const REFRESH_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Claims for the short-lived access token
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Account ID
    pub sub: String,
    pub role: Role,
    /// Store the account manages (store owners only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Claims for the long-lived refresh token
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Account ID
    pub sub: String,
    /// Account refresh generation at issue time
    #[serde(rename = "gen")]
    pub generation: i64,
    /// Unique token ID, target of single-session revocation
    pub jti: String,
    pub exp: usize,
    pub iat: usize,
}

/// Token pair returned on successful authentication
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn issue_access_token(
    account_id: &str,
    role: Role,
    store_id: Option<String>,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: account_id.to_string(),
        role,
        store_id,
        exp: (now + ACCESS_TTL_SECS) as usize,
        iat: now as usize,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Issue a refresh token; returns (token, jti)
pub fn issue_refresh_token(
    account_id: &str,
    generation: i64,
    secret: &str,
) -> Result<(String, String), jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let jti = uuid::Uuid::new_v4().to_string();
    let claims = RefreshClaims {
        sub: account_id.to_string(),
        generation,
        jti: jti.clone(),
        exp: (now + REFRESH_TTL_SECS) as usize,
        iat: now as usize,
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, jti))
}

pub fn decode_access(token: &str, secret: &str) -> Result<AccessClaims, AppError> {
    jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::new(ErrorCode::TokenExpired),
        _ => AppError::new(ErrorCode::TokenInvalid),
    })
}

/// Decode a refresh token. Expired, malformed, and wrongly-signed tokens all
/// collapse to `SessionExpired`: the client reaction is the same, log in again.
pub fn decode_refresh(token: &str, secret: &str) -> Result<RefreshClaims, AppError> {
    jsonwebtoken::decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::new(ErrorCode::SessionExpired))
}

/// Issue a fresh access + refresh pair; returns (pair, refresh jti)
pub fn issue_pair(
    account_id: &str,
    role: Role,
    store_id: Option<String>,
    generation: i64,
    access_secret: &str,
    refresh_secret: &str,
) -> Result<(TokenPair, String), jsonwebtoken::errors::Error> {
    let access_token = issue_access_token(account_id, role, store_id, access_secret)?;
    let (refresh_token, jti) = issue_refresh_token(account_id, generation, refresh_secret)?;
    Ok((
        TokenPair {
            access_token,
            refresh_token,
        },
        jti,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_access_token_roundtrip() {
        let token = issue_access_token("acc-1", Role::Customer, None, SECRET).unwrap();
        let claims = decode_access(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "acc-1");
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.store_id, None);
    }

    #[test]
    fn test_access_token_carries_store_id() {
        let token =
            issue_access_token("acc-2", Role::StoreOwner, Some("store-9".into()), SECRET).unwrap();
        let claims = decode_access(&token, SECRET).unwrap();
        assert_eq!(claims.role, Role::StoreOwner);
        assert_eq!(claims.store_id.as_deref(), Some("store-9"));
    }

    #[test]
    fn test_access_token_wrong_secret() {
        let token = issue_access_token("acc-1", Role::Customer, None, SECRET).unwrap();
        let err = decode_access(&token, "other-secret").unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenInvalid);
    }

    #[test]
    fn test_access_token_expired() {
        // Encode with exp well in the past (beyond the default leeway)
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            sub: "acc-1".into(),
            role: Role::Customer,
            store_id: None,
            exp: (now - 3600) as usize,
            iat: (now - 7200) as usize,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = decode_access(&token, SECRET).unwrap_err();
        assert_eq!(err.code, ErrorCode::TokenExpired);
    }

    #[test]
    fn test_refresh_token_roundtrip() {
        let (token, jti) = issue_refresh_token("acc-1", 7, SECRET).unwrap();
        let claims = decode_refresh(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "acc-1");
        assert_eq!(claims.generation, 7);
        assert_eq!(claims.jti, jti);
    }

    #[test]
    fn test_refresh_token_garbage() {
        let err = decode_refresh("not.a.jwt", SECRET).unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionExpired);
    }

    #[test]
    fn test_refresh_token_wrong_secret() {
        let (token, _) = issue_refresh_token("acc-1", 0, SECRET).unwrap();
        let err = decode_refresh(&token, "other-secret").unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionExpired);
    }

    #[test]
    fn test_refresh_jti_unique_per_issue() {
        let (_, jti_a) = issue_refresh_token("acc-1", 0, SECRET).unwrap();
        let (_, jti_b) = issue_refresh_token("acc-1", 0, SECRET).unwrap();
        assert_ne!(jti_a, jti_b);
    }

    #[test]
    fn test_access_and_refresh_keyspaces_disjoint() {
        // A refresh token must never validate as an access token even with
        // the same secret on both sides
        let (token, _) = issue_refresh_token("acc-1", 0, SECRET).unwrap();
        assert!(decode_access(&token, SECRET).is_err());
    }
}
