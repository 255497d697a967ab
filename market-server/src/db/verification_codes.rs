//! One-time verification codes, keyed by (email, kind)
//!
//! Codes are stored hashed. The upsert resets the attempt counter, so a new
//! request always invalidates any outstanding code for the same purpose.

use sqlx::PgPool;

pub const KIND_EMAIL_VERIFY: &str = "email_verify";
pub const KIND_PASSWORD_RESET: &str = "password_reset";

#[derive(sqlx::FromRow)]
pub struct VerificationCode {
    pub email: String,
    pub kind: String,
    pub code_hash: String,
    pub attempts: i32,
    pub expires_at: i64,
    pub created_at: i64,
}

pub async fn upsert(
    pool: &PgPool,
    email: &str,
    kind: &str,
    code_hash: &str,
    expires_at: i64,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO verification_codes (email, kind, code_hash, attempts, expires_at, created_at)
         VALUES ($1, $2, $3, 0, $4, $5)
         ON CONFLICT (email, kind) DO UPDATE SET
            code_hash = $3, attempts = 0, expires_at = $4, created_at = $5",
    )
    .bind(email)
    .bind(kind)
    .bind(code_hash)
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find(
    pool: &PgPool,
    email: &str,
    kind: &str,
) -> Result<Option<VerificationCode>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM verification_codes WHERE email = $1 AND kind = $2")
        .bind(email)
        .bind(kind)
        .fetch_optional(pool)
        .await
}

pub async fn increment_attempts(pool: &PgPool, email: &str, kind: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE verification_codes SET attempts = attempts + 1 WHERE email = $1 AND kind = $2",
    )
    .bind(email)
    .bind(kind)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, email: &str, kind: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM verification_codes WHERE email = $1 AND kind = $2")
        .bind(email)
        .bind(kind)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_expired(pool: &PgPool, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM verification_codes WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
