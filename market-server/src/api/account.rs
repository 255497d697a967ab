//! Account endpoints: password recovery, password change, profile

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use shared::models::Role;

use super::{ApiResult, CODE_TTL_MS, code_expired, normalize_email, validate_password};
use crate::auth::Identity;
use crate::db;
use crate::db::verification_codes::KIND_PASSWORD_RESET;
use crate::state::AppState;
use crate::util::{generate_code, hash_password, verify_password};

const MAX_CODE_ATTEMPTS: i32 = 3;
const FORGOT_PASSWORD_MESSAGE: &str = "If the email exists, a reset code has been sent";

// ── POST /api/auth/forgot-password ──

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// The response is identical whether or not the email is registered, so the
/// endpoint cannot be used to enumerate accounts. DB errors after the rate
/// check are swallowed for the same reason.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Value> {
    let email = normalize_email(&req.email);

    // 3 requests per email per 5 minutes, applied before any lookup
    if !state
        .rate_limiter
        .check("forgot-password", &email, 3, 300)
        .await
    {
        return Err(AppError::new(ErrorCode::TooManyRequests).into());
    }

    let account = match db::accounts::find_by_email(&state.pool, &email).await {
        Ok(Some(a)) => a,
        _ => {
            return Ok(Json(json!({ "message": FORGOT_PASSWORD_MESSAGE })));
        }
    };

    let now = shared::util::now_millis();
    let code = generate_code();
    let Ok(code_hash) = hash_password(&code) else {
        return Ok(Json(json!({ "message": FORGOT_PASSWORD_MESSAGE })));
    };

    if let Err(e) = db::verification_codes::upsert(
        &state.pool,
        &email,
        KIND_PASSWORD_RESET,
        &code_hash,
        now + CODE_TTL_MS,
        now,
    )
    .await
    {
        tracing::error!(account_id = %account.id, "Failed to save reset code: {e}");
        return Ok(Json(json!({ "message": FORGOT_PASSWORD_MESSAGE })));
    }

    if let Err(e) = state.mailer.send_password_reset_code(&email, &code).await {
        tracing::warn!(email = %email, "Failed to send reset email: {e}");
    }

    Ok(Json(json!({ "message": FORGOT_PASSWORD_MESSAGE })))
}

// ── POST /api/auth/reset-password ──

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Value> {
    let email = normalize_email(&req.email);
    validate_password(&req.new_password)?;

    let record = db::verification_codes::find(&state.pool, &email, KIND_PASSWORD_RESET)
        .await?
        .ok_or_else(|| {
            AppError::with_message(
                ErrorCode::VerificationCodeInvalid,
                "No password reset pending for this email",
            )
        })?;

    let now = shared::util::now_millis();
    if code_expired(record.expires_at, now) {
        return Err(AppError::new(ErrorCode::VerificationCodeExpired).into());
    }
    if record.attempts >= MAX_CODE_ATTEMPTS {
        return Err(AppError::new(ErrorCode::TooManyAttempts).into());
    }

    db::verification_codes::increment_attempts(&state.pool, &email, KIND_PASSWORD_RESET).await?;

    if !verify_password(&req.code, &record.code_hash) {
        return Err(AppError::new(ErrorCode::VerificationCodeInvalid).into());
    }

    let account = db::accounts::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::AccountNotFound))?;

    let hashed = hash_password(&req.new_password)?;
    // One statement: new hash + generation bump, all refresh tokens die
    db::accounts::update_password_and_bump_generation(&state.pool, &account.id, &hashed).await?;

    let _ = db::verification_codes::delete(&state.pool, &email, KIND_PASSWORD_RESET).await;

    tracing::info!(account_id = %account.id, "Password reset");

    Ok(Json(json!({ "message": "Password has been reset" })))
}

// ── POST /api/auth/change-password ──

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Value> {
    validate_password(&req.new_password)?;

    let account = db::accounts::find_by_id(&state.pool, &identity.account_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::AccountNotFound))?;

    if !verify_password(&req.current_password, &account.hashed_password) {
        return Err(AppError::new(ErrorCode::InvalidCredentials).into());
    }

    let hashed = hash_password(&req.new_password)?;
    // Same contract as reset: every other session is signed out
    db::accounts::update_password_and_bump_generation(&state.pool, &account.id, &hashed).await?;

    tracing::info!(account_id = %account.id, "Password changed");

    Ok(Json(
        json!({ "message": "Password changed, other sessions signed out" }),
    ))
}

// ── GET /api/auth/me ──

#[derive(Serialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    pub email_verified: bool,
    pub created_at: i64,
}

pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Profile> {
    let account = db::accounts::find_by_id(&state.pool, &identity.account_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::AccountNotFound))?;

    let role = Role::parse(&account.role)
        .ok_or_else(|| AppError::internal("Unknown role in account record"))?;

    Ok(Json(Profile {
        id: account.id,
        name: account.name,
        email: account.email,
        role,
        store_id: account.store_id,
        email_verified: account.email_verified,
        created_at: account.created_at,
    }))
}
