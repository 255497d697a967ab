use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub hashed_password: String,
    pub role: String,
    pub store_id: Option<String>,
    pub email_verified: bool,
    pub refresh_generation: i64,
    pub created_at: i64,
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &PgPool,
    id: &str,
    name: &str,
    email: &str,
    hashed_password: &str,
    role: &str,
    store_id: Option<&str>,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO accounts
            (id, name, email, hashed_password, role, store_id,
             email_verified, refresh_generation, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, 0, $7)",
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(hashed_password)
    .bind(role)
    .bind(store_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn set_verified(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE accounts SET email_verified = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Set a new password hash and invalidate all outstanding refresh tokens in
/// one statement. Single UPDATE keeps the two effects atomic under
/// concurrent logins.
pub async fn update_password_and_bump_generation(
    pool: &PgPool,
    id: &str,
    hashed_password: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE accounts
         SET hashed_password = $2, refresh_generation = refresh_generation + 1
         WHERE id = $1",
    )
    .bind(id)
    .bind(hashed_password)
    .execute(pool)
    .await?;
    Ok(())
}
