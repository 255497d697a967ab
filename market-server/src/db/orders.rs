//! Order storage and the conditional-UPDATE transition primitive

use rust_decimal::Decimal;
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
pub struct OrderRow {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub store_id: String,
    /// JSONB array of item snapshots
    pub items: serde_json::Value,
    pub total_amount: Decimal,
    pub total_savings: Decimal,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct HistoryRow {
    pub status: String,
    pub actor_id: String,
    pub note: Option<String>,
    pub created_at: i64,
}

/// Insert a new order and its initial history row in one transaction
pub async fn insert(pool: &PgPool, order: &OrderRow, actor_id: &str) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO orders
            (id, order_number, customer_id, store_id, items,
             total_amount, total_savings, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(&order.customer_id)
    .bind(&order.store_id)
    .bind(&order.items)
    .bind(order.total_amount)
    .bind(order.total_savings)
    .bind(&order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, actor_id, note, created_at)
         VALUES ($1, $2, $3, NULL, $4)",
    )
    .bind(&order.id)
    .bind(&order.status)
    .bind(actor_id)
    .bind(order.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_for_customer(
    pool: &PgPool,
    customer_id: &str,
) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
        .bind(customer_id)
        .fetch_all(pool)
        .await
}

pub async fn list_for_store(pool: &PgPool, store_id: &str) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE store_id = $1 ORDER BY created_at DESC")
        .bind(store_id)
        .fetch_all(pool)
        .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn history(pool: &PgPool, order_id: &str) -> Result<Vec<HistoryRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT status, actor_id, note, created_at
         FROM order_status_history
         WHERE order_id = $1
         ORDER BY created_at ASC, id ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
}

/// Compare-and-swap status transition.
///
/// The UPDATE is conditional on the status still being `from`; when two
/// requests race, exactly one sees `rows_affected == 1`. The loser gets
/// `Ok(false)` and must re-read to find out why. `created_after` carries the
/// customer cancellation cutoff into the WHERE clause so the window check
/// happens at write time, not at read time.
pub async fn transition(
    pool: &PgPool,
    order_id: &str,
    from: &str,
    to: &str,
    actor_id: &str,
    note: Option<&str>,
    now: i64,
    created_after: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE orders
         SET status = $3, updated_at = $4
         WHERE id = $1 AND status = $2
           AND ($5::BIGINT IS NULL OR created_at >= $5)",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(now)
    .bind(created_after)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() != 1 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO order_status_history (order_id, status, actor_id, note, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(order_id)
    .bind(to)
    .bind(actor_id)
    .bind(note)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Derived store aggregates: (pending order count, completed revenue)
pub async fn store_stats(pool: &PgPool, store_id: &str) -> Result<(i64, Decimal), sqlx::Error> {
    let row: (i64, Decimal) = sqlx::query_as(
        "SELECT
            COUNT(*) FILTER (WHERE status = 'pending'),
            COALESCE(SUM(total_amount) FILTER (WHERE status = 'completed'), 0)
         FROM orders WHERE store_id = $1",
    )
    .bind(store_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
