//! market-server — FreshCart marketplace core
//!
//! Long-running service that:
//! - Manages accounts: registration, email verification, login, password flows
//! - Issues and validates JWT session tokens (access + refresh)
//! - Drives the order lifecycle state machine with per-order linearization

mod api;
mod auth;
mod config;
mod db;
mod email;
mod error;
mod state;
mod util;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting market-server (env: {})", config.environment);

    // Initialize application state
    let state = AppState::new(&config).await?;

    let app = api::create_router(state.clone());

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("market-server HTTP listening on {http_addr}");

    // Periodic housekeeping (every 5 minutes): rate limiter windows,
    // expired verification codes, expired revocation records
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            sweep_state.rate_limiter.cleanup().await;

            let now = shared::util::now_millis();
            if let Err(e) = db::verification_codes::delete_expired(&sweep_state.pool, now).await {
                tracing::warn!("Verification code sweep failed: {e}");
            }
            if let Err(e) = db::revoked_tokens::delete_expired(&sweep_state.pool, now).await {
                tracing::warn!("Revoked token sweep failed: {e}");
            }
        }
    });

    axum::serve(listener, app).await?;

    Ok(())
}
