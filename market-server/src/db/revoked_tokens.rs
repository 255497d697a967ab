//! Revoked refresh-token IDs (single-session logout)
//!
//! Rows only need to live until the token they name would have expired
//! anyway; the periodic sweep reclaims them.

use sqlx::PgPool;

pub async fn revoke(
    pool: &PgPool,
    jti: &str,
    account_id: &str,
    expires_at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO revoked_refresh_tokens (jti, account_id, expires_at)
         VALUES ($1, $2, $3)
         ON CONFLICT (jti) DO NOTHING",
    )
    .bind(jti)
    .bind(account_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn is_revoked(pool: &PgPool, jti: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT jti FROM revoked_refresh_tokens WHERE jti = $1")
            .bind(jti)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

pub async fn delete_expired(pool: &PgPool, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM revoked_refresh_tokens WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
