//! Access-token authentication middleware

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use shared::error::{AppError, ErrorCode};
use shared::models::Role;

use crate::auth::session;
use crate::state::AppState;

/// Authenticated identity extracted from the access token
#[derive(Debug, Clone)]
pub struct Identity {
    pub account_id: String,
    pub role: Role,
    pub store_id: Option<String>,
}

/// Middleware that extracts and verifies the access JWT from the
/// Authorization header, inserting an [`Identity`] extension on success
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::new(ErrorCode::NotAuthenticated).into_response())?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::with_message(ErrorCode::NotAuthenticated, "Invalid Authorization format")
            .into_response()
    })?;

    let claims = session::decode_access(token, &state.jwt_access_secret)
        .map_err(|e| e.into_response())?;

    let identity = Identity {
        account_id: claims.sub,
        role: claims.role,
        store_id: claims.store_id,
    };

    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
