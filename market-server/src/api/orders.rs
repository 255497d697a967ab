//! Order lifecycle endpoints
//!
//! POST  /api/orders              — place an order (customer)
//! GET   /api/orders              — caller's orders (admin sees all)
//! GET   /api/orders/{id}         — order detail with status history
//! PATCH /api/orders/{id}/status  — role-gated status transition (CAS)
//! PATCH /api/orders/{id}/cancel  — cancel; customers only within the window
//! GET   /api/store/orders        — store's orders with derived aggregates

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::models::Role;
use shared::models::order::{
    self, CANCELLATION_WINDOW_MS, OrderItem, OrderStatus, StatusHistoryEntry,
};

use super::ApiResult;
use crate::auth::Identity;
use crate::db::{self, orders::OrderRow};
use crate::error::ServiceError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub store_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub total_savings: Decimal,
    pub status: OrderStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

fn parse_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::parse(raw)
        .ok_or_else(|| ServiceError::Db(format!("unknown order status in row: {raw}").into()))
}

fn to_response(row: OrderRow) -> Result<OrderResponse, ServiceError> {
    let status = parse_status(&row.status)?;
    let items: Vec<OrderItem> = serde_json::from_value(row.items)?;
    Ok(OrderResponse {
        id: row.id,
        order_number: row.order_number,
        customer_id: row.customer_id,
        store_id: row.store_id,
        items,
        total_amount: row.total_amount,
        total_savings: row.total_savings,
        status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Visibility check. Orders outside the caller's scope read as not found,
/// so order IDs cannot be probed.
fn check_order_access(identity: &Identity, order: &OrderRow) -> Result<(), AppError> {
    let allowed = match identity.role {
        Role::Admin => true,
        Role::Customer => order.customer_id == identity.account_id,
        Role::StoreOwner => identity.store_id.as_deref() == Some(order.store_id.as_str()),
    };
    if allowed {
        Ok(())
    } else {
        Err(AppError::new(ErrorCode::OrderNotFound))
    }
}

// ── POST /api/orders ──

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub store_id: String,
    /// Item snapshots with caller-supplied prices; frozen at creation
    pub items: Vec<OrderItem>,
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<OrderResponse> {
    if identity.role != Role::Customer {
        return Err(AppError::permission_denied("Only customers can place orders").into());
    }
    if req.items.is_empty() {
        return Err(AppError::new(ErrorCode::OrderEmpty).into());
    }
    if req.items.iter().any(|item| item.quantity <= 0) {
        return Err(AppError::new(ErrorCode::InvalidQuantity).into());
    }
    if req.store_id.trim().is_empty() {
        return Err(AppError::validation("store_id must not be empty").into());
    }

    let (total_amount, total_savings) = order::order_totals(&req.items);
    let now = shared::util::now_millis();

    let row = OrderRow {
        id: uuid::Uuid::new_v4().to_string(),
        order_number: crate::util::generate_order_number(),
        customer_id: identity.account_id.clone(),
        store_id: req.store_id,
        items: serde_json::to_value(&req.items)?,
        total_amount,
        total_savings,
        status: OrderStatus::Pending.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };

    db::orders::insert(&state.pool, &row, &identity.account_id).await?;

    tracing::info!(order_id = %row.id, order_number = %row.order_number, "Order created");

    Ok(Json(to_response(row)?))
}

// ── Transition core (shared by /status and /cancel) ──

async fn apply_transition(
    state: &AppState,
    identity: &Identity,
    order_id: &str,
    target: OrderStatus,
    note: Option<String>,
) -> Result<OrderResponse, ServiceError> {
    let order = db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
    check_order_access(identity, &order)?;

    let current = parse_status(&order.status)?;

    // Re-issuing an already-applied transition is a no-op success
    if current == target {
        return to_response(order);
    }

    if !current.can_transition(target) {
        return Err(AppError::illegal_transition(current.as_str(), target.as_str()).into());
    }
    if !current.role_may_transition(identity.role, target) {
        return Err(AppError::permission_denied(format!(
            "Role '{}' may not move an order from '{current}' to '{target}'",
            identity.role
        ))
        .into());
    }

    let now = shared::util::now_millis();
    // Customer cancels carry the window cutoff into the WHERE clause, so the
    // check happens at write time rather than against the read above
    let created_after = (identity.role == Role::Customer && target == OrderStatus::Cancelled)
        .then(|| now - CANCELLATION_WINDOW_MS);

    let applied = db::orders::transition(
        &state.pool,
        order_id,
        current.as_str(),
        target.as_str(),
        &identity.account_id,
        note.as_deref(),
        now,
        created_after,
    )
    .await?;

    if !applied {
        // Lost a race, or a customer cancel hit the cutoff. Re-read to tell.
        let fresh = db::orders::find_by_id(&state.pool, order_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        let fresh_status = parse_status(&fresh.status)?;

        if fresh_status == target {
            // A concurrent request already applied the same transition
            return to_response(fresh);
        }
        if fresh_status == current && created_after.is_some() {
            return Err(AppError::new(ErrorCode::CancellationWindowExpired).into());
        }
        return Err(AppError::illegal_transition(fresh_status.as_str(), target.as_str()).into());
    }

    tracing::info!(
        order_id = %order_id,
        from = %current,
        to = %target,
        actor = %identity.account_id,
        "Order status transition"
    );

    // Every applied transition notifies the customer, best-effort
    notify_customer(state, &order, target).await;

    let fresh = db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
    to_response(fresh)
}

async fn notify_customer(state: &AppState, order: &OrderRow, status: OrderStatus) {
    match db::accounts::find_by_id(&state.pool, &order.customer_id).await {
        Ok(Some(customer)) => {
            if let Err(e) = state
                .mailer
                .send_order_status_update(&customer.email, &order.order_number, status.as_str())
                .await
            {
                tracing::warn!(order_id = %order.id, "Failed to send order update: {e}");
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(order_id = %order.id, "Failed to load customer for notification: {e}")
        }
    }
}

// ── PATCH /api/orders/{id}/status ──

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<OrderResponse> {
    let resp = apply_transition(&state, &identity, &id, req.status, req.note).await?;
    Ok(Json(resp))
}

// ── PATCH /api/orders/{id}/cancel ──

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<OrderResponse> {
    let resp = apply_transition(&state, &identity, &id, OrderStatus::Cancelled, req.note).await?;
    Ok(Json(resp))
}

// ── GET /api/orders ──

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<OrderResponse>> {
    let rows = match identity.role {
        Role::Admin => db::orders::list_all(&state.pool).await?,
        Role::Customer => db::orders::list_for_customer(&state.pool, &identity.account_id).await?,
        Role::StoreOwner => {
            let store_id = identity
                .store_id
                .as_deref()
                .ok_or_else(|| AppError::permission_denied("Store owner has no store"))?;
            db::orders::list_for_store(&state.pool, store_id).await?
        }
    };

    let orders = rows
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(orders))
}

// ── GET /api/orders/{id} ──

#[derive(Serialize)]
pub struct OrderDetailResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub status_history: Vec<StatusHistoryEntry>,
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<OrderDetailResponse> {
    let row = db::orders::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
    check_order_access(&identity, &row)?;

    let status_history = db::orders::history(&state.pool, &row.id)
        .await?
        .into_iter()
        .map(|h| {
            Ok(StatusHistoryEntry {
                status: parse_status(&h.status)?,
                actor_id: h.actor_id,
                note: h.note,
                created_at: h.created_at,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(Json(OrderDetailResponse {
        order: to_response(row)?,
        status_history,
    }))
}

// ── GET /api/store/orders ──

#[derive(Deserialize)]
pub struct StoreOrdersQuery {
    /// Admins must name the store; store owners use their own
    pub store_id: Option<String>,
}

#[derive(Serialize)]
pub struct StoreOrdersResponse {
    pub orders: Vec<OrderResponse>,
    pub pending_count: i64,
    pub completed_revenue: Decimal,
}

pub async fn store_orders(
    State(state): State<AppState>,
    Query(query): Query<StoreOrdersQuery>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StoreOrdersResponse> {
    let store_id = match identity.role {
        Role::StoreOwner => identity
            .store_id
            .clone()
            .ok_or_else(|| AppError::permission_denied("Store owner has no store"))?,
        Role::Admin => query
            .store_id
            .ok_or_else(|| AppError::validation("store_id query parameter is required"))?,
        Role::Customer => return Err(AppError::new(ErrorCode::RoleRequired).into()),
    };

    let rows = db::orders::list_for_store(&state.pool, &store_id).await?;
    let (pending_count, completed_revenue) = db::orders::store_stats(&state.pool, &store_id).await?;

    let orders = rows
        .into_iter()
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(StoreOrdersResponse {
        orders,
        pending_count,
        completed_revenue,
    }))
}
