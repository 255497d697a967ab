//! API routes for market-server

pub mod account;
pub mod auth;
pub mod health;
pub mod orders;

use axum::routing::{get, patch, post};
use axum::{Router, middleware};
use shared::error::AppError;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::require_auth;
use crate::auth::rate_limit::{login_rate_limit, register_rate_limit};
use crate::error::ServiceError;
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, ServiceError>;

/// Verification code lifetime (10 minutes)
pub const CODE_TTL_MS: i64 = 10 * 60 * 1000;

/// Whether a stored code is expired at `now` (both epoch milliseconds).
/// A code presented exactly at its expiry instant is still accepted.
pub fn code_expired(expires_at: i64, now: i64) -> bool {
    now > expires_at
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::validation("Invalid email address"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 6 {
        return Err(AppError::new(shared::error::ErrorCode::PasswordTooShort));
    }
    Ok(())
}

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Registration (IP rate-limited)
    let register = Router::new()
        .route("/api/auth/register", post(auth::register))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            register_rate_limit,
        ));

    // Login (IP rate-limited)
    let login = Router::new()
        .route("/api/auth/login", post(auth::login))
        .layer(middleware::from_fn_with_state(state.clone(), login_rate_limit));

    // Other public session routes (per-email limits live in the handlers)
    let public = Router::new()
        .route("/api/auth/verify-email", post(auth::verify_email))
        .route("/api/auth/resend-code", post(auth::resend_code))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/forgot-password", post(account::forgot_password))
        .route("/api/auth/reset-password", post(account::reset_password));

    // Authenticated routes
    let protected = Router::new()
        .route("/api/auth/me", get(account::me))
        .route("/api/auth/change-password", post(account::change_password))
        .route(
            "/api/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/status", patch(orders::update_status))
        .route("/api/orders/{id}/cancel", patch(orders::cancel_order))
        .route("/api/store/orders", get(orders::store_orders))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(register)
        .merge(login)
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_expiry_boundaries() {
        let issued = 1_700_000_000_000;
        let expires_at = issued + CODE_TTL_MS;

        // 1 second before expiry: valid
        assert!(!code_expired(expires_at, expires_at - 1_000));
        // exactly at expiry: still valid (inclusive)
        assert!(!code_expired(expires_at, expires_at));
        // 1 second past expiry: rejected
        assert!(code_expired(expires_at, expires_at + 1_000));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Foo@Example.COM "), "foo@example.com");
        assert_eq!(normalize_email("bar@shop.io"), "bar@shop.io");
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
    }

    #[test]
    fn test_validate_password_boundary() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}
