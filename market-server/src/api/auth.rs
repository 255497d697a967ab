//! Session endpoints
//!
//! POST /api/auth/register     — create unverified account + send code
//! POST /api/auth/verify-email — verify code → session token pair
//! POST /api/auth/resend-code  — regenerate verification code
//! POST /api/auth/login        — password login (or needs_verification routing)
//! POST /api/auth/refresh      — rotate refresh token, mint access token
//! POST /api/auth/logout       — revoke the presented refresh token

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use shared::models::Role;

use super::{ApiResult, CODE_TTL_MS, code_expired, normalize_email, validate_email, validate_password};
use crate::auth::session::{self, TokenPair};
use crate::db;
use crate::db::verification_codes::KIND_EMAIL_VERIFY;
use crate::error::ServiceError;
use crate::state::AppState;
use crate::util::{generate_code, hash_password, verify_password};

const MAX_CODE_ATTEMPTS: i32 = 3;

// ── POST /api/auth/register ──

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Store owners may bring an existing store ID; one is minted otherwise
    pub store_id: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub account_id: String,
    pub message: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<RegisterResponse> {
    let email = normalize_email(&req.email);
    validate_email(&email)?;
    validate_password(&req.password)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Name must not be empty").into());
    }
    // Admin accounts are provisioned out of band
    if req.role == Role::Admin {
        return Err(AppError::validation("Role must be customer or store_owner").into());
    }

    if db::accounts::find_by_email(&state.pool, &email)
        .await?
        .is_some()
    {
        return Err(AppError::new(ErrorCode::EmailAlreadyRegistered).into());
    }

    let hashed_password = hash_password(&req.password)?;
    let account_id = uuid::Uuid::new_v4().to_string();
    let now = shared::util::now_millis();

    let store_id = match req.role {
        Role::StoreOwner => Some(
            req.store_id
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        ),
        _ => None,
    };

    // Two concurrent registrations can both pass the lookup above; the
    // loser's INSERT then trips the accounts.email unique constraint and
    // must surface as the same duplicate error, not a 500.
    db::accounts::create(
        &state.pool,
        &account_id,
        name,
        &email,
        &hashed_password,
        req.role.as_str(),
        store_id.as_deref(),
        now,
    )
    .await
    .map_err(create_account_error)?;

    let code = generate_code();
    let code_hash = hash_password(&code)?;
    db::verification_codes::upsert(
        &state.pool,
        &email,
        KIND_EMAIL_VERIFY,
        &code_hash,
        now + CODE_TTL_MS,
        now,
    )
    .await?;

    if let Err(e) = state.mailer.send_verification_code(&email, &code).await {
        tracing::warn!(email = %email, "Failed to send verification email: {e}");
    }

    tracing::info!(account_id = %account_id, email = %email, "Account registered, verification pending");

    Ok(Json(RegisterResponse {
        account_id,
        message: "Verification code sent to your email".into(),
    }))
}

fn create_account_error(e: sqlx::Error) -> ServiceError {
    if e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        return AppError::new(ErrorCode::EmailAlreadyRegistered).into();
    }
    e.into()
}

// ── POST /api/auth/verify-email ──

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub account_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<SessionResponse> {
    let email = normalize_email(&req.email);
    let now = shared::util::now_millis();

    let account = db::accounts::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::AccountNotFound))?;

    let record = db::verification_codes::find(&state.pool, &email, KIND_EMAIL_VERIFY)
        .await?
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::VerificationCodeInvalid,
                "No verification pending for this email",
            )
        })?;

    if code_expired(record.expires_at, now) {
        return Err(AppError::new(ErrorCode::VerificationCodeExpired).into());
    }
    if record.attempts >= MAX_CODE_ATTEMPTS {
        return Err(AppError::new(ErrorCode::TooManyAttempts).into());
    }

    db::verification_codes::increment_attempts(&state.pool, &email, KIND_EMAIL_VERIFY).await?;

    if !verify_password(&req.code, &record.code_hash) {
        return Err(AppError::new(ErrorCode::VerificationCodeInvalid).into());
    }

    db::accounts::set_verified(&state.pool, &account.id).await?;
    // Single use
    let _ = db::verification_codes::delete(&state.pool, &email, KIND_EMAIL_VERIFY).await;

    let role = Role::parse(&account.role)
        .ok_or_else(|| AppError::internal("Unknown role in account record"))?;
    let (tokens, _jti) = session::issue_pair(
        &account.id,
        role,
        account.store_id.clone(),
        account.refresh_generation,
        &state.jwt_access_secret,
        &state.jwt_refresh_secret,
    )?;

    tracing::info!(account_id = %account.id, "Email verified");

    Ok(Json(SessionResponse {
        account_id: account.id,
        role,
        store_id: account.store_id,
        tokens,
    }))
}

// ── POST /api/auth/resend-code ──

#[derive(Deserialize)]
pub struct ResendRequest {
    pub email: String,
}

pub async fn resend_code(
    State(state): State<AppState>,
    Json(req): Json<ResendRequest>,
) -> ApiResult<Value> {
    let email = normalize_email(&req.email);

    // 3 codes per email per 5 minutes
    if !state.rate_limiter.check("resend-code", &email, 3, 300).await {
        return Err(AppError::new(ErrorCode::TooManyRequests).into());
    }

    let account = db::accounts::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::AccountNotFound))?;

    if account.email_verified {
        return Err(
            AppError::with_message(ErrorCode::AlreadyExists, "Email already verified").into(),
        );
    }

    let now = shared::util::now_millis();
    let code = generate_code();
    let code_hash = hash_password(&code)?;
    db::verification_codes::upsert(
        &state.pool,
        &email,
        KIND_EMAIL_VERIFY,
        &code_hash,
        now + CODE_TTL_MS,
        now,
    )
    .await?;

    if let Err(e) = state.mailer.send_verification_code(&email, &code).await {
        tracing::warn!(email = %email, "Failed to send verification email: {e}");
    }

    tracing::info!(email = %email, "Verification code resent");

    Ok(Json(json!({ "message": "Verification code resent" })))
}

// ── POST /api/auth/login ──

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login outcome: either a session, or a routing hint that the account
/// still needs email verification. Both are 200s; `needs_verification`
/// is not an error.
#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginResponse {
    NeedsVerification {
        email: String,
    },
    Authenticated {
        account_id: String,
        role: Role,
        #[serde(skip_serializing_if = "Option::is_none")]
        store_id: Option<String>,
        access_token: String,
        refresh_token: String,
    },
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let email = normalize_email(&req.email);

    // Unknown email and wrong password are indistinguishable to the caller
    let account = db::accounts::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::InvalidCredentials))?;

    if !verify_password(&req.password, &account.hashed_password) {
        return Err(AppError::new(ErrorCode::InvalidCredentials).into());
    }

    if !account.email_verified {
        return Ok(Json(LoginResponse::NeedsVerification { email }));
    }

    let role = Role::parse(&account.role)
        .ok_or_else(|| AppError::internal("Unknown role in account record"))?;
    let (tokens, _jti) = session::issue_pair(
        &account.id,
        role,
        account.store_id.clone(),
        account.refresh_generation,
        &state.jwt_access_secret,
        &state.jwt_refresh_secret,
    )?;

    tracing::info!(account_id = %account.id, "Login");

    Ok(Json(LoginResponse::Authenticated {
        account_id: account.id,
        role,
        store_id: account.store_id,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

// ── POST /api/auth/refresh ──

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<TokenPair> {
    let claims = session::decode_refresh(&req.refresh_token, &state.jwt_refresh_secret)?;

    let account = db::accounts::find_by_id(&state.pool, &claims.sub)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::SessionRevoked))?;

    // Stale generation: password changed since this token was issued
    if claims.generation != account.refresh_generation {
        return Err(AppError::new(ErrorCode::SessionRevoked).into());
    }
    // Explicitly logged out
    if db::revoked_tokens::is_revoked(&state.pool, &claims.jti).await? {
        return Err(AppError::new(ErrorCode::SessionRevoked).into());
    }

    let role = Role::parse(&account.role)
        .ok_or_else(|| AppError::internal("Unknown role in account record"))?;
    let (tokens, _jti) = session::issue_pair(
        &account.id,
        role,
        account.store_id,
        account.refresh_generation,
        &state.jwt_access_secret,
        &state.jwt_refresh_secret,
    )?;

    Ok(Json(tokens))
}

// ── POST /api/auth/logout ──

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Advisory single-session logout: record the token's jti as revoked.
/// A malformed or already-dead token still logs out successfully.
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> ApiResult<Value> {
    if let Ok(claims) = session::decode_refresh(&req.refresh_token, &state.jwt_refresh_secret) {
        let expires_at = (claims.exp as i64) * 1000;
        if let Err(e) =
            db::revoked_tokens::revoke(&state.pool, &claims.jti, &claims.sub, expires_at).await
        {
            tracing::warn!("Failed to record revoked token: {e}");
        }
    }

    Ok(Json(json!({ "message": "Logged out" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::ErrorKind;

    #[derive(Debug)]
    struct ConstraintError {
        unique: bool,
    }

    impl std::fmt::Display for ConstraintError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "constraint violation")
        }
    }

    impl std::error::Error for ConstraintError {}

    impl sqlx::error::DatabaseError for ConstraintError {
        fn message(&self) -> &str {
            "constraint violation"
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn test_concurrent_register_unique_violation_maps_to_duplicate_email() {
        let err = sqlx::Error::Database(Box::new(ConstraintError { unique: true }));
        match create_account_error(err) {
            ServiceError::App(app) => assert_eq!(app.code, ErrorCode::EmailAlreadyRegistered),
            other => panic!("expected duplicate-email error, got {other:?}"),
        }
    }

    #[test]
    fn test_other_insert_errors_stay_internal() {
        let err = sqlx::Error::Database(Box::new(ConstraintError { unique: false }));
        assert!(matches!(create_account_error(err), ServiceError::Db(_)));

        let err = sqlx::Error::RowNotFound;
        assert!(matches!(create_account_error(err), ServiceError::Db(_)));
    }
}
