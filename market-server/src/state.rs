//! Application state for market-server

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::email::{LogMailer, Mailer, SesMailer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Outbound email sender
    pub mailer: Arc<dyn Mailer>,
    /// JWT secret for access tokens
    pub jwt_access_secret: String,
    /// JWT secret for refresh tokens
    pub jwt_refresh_secret: String,
    /// Rate limiter for auth routes
    pub rate_limiter: crate::auth::rate_limit::RateLimiter,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mailer: Arc<dyn Mailer> = if config.environment == "development" {
            tracing::info!("Using log mailer (development)");
            Arc::new(LogMailer)
        } else {
            let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let ses = if let Ok(ses_region) = std::env::var("SES_REGION") {
                let ses_config = aws_config
                    .to_builder()
                    .region(aws_config::Region::new(ses_region))
                    .build();
                aws_sdk_sesv2::Client::new(&ses_config)
            } else {
                aws_sdk_sesv2::Client::new(&aws_config)
            };
            Arc::new(SesMailer::new(ses, config.ses_from_email.clone()))
        };

        Ok(Self {
            pool,
            mailer,
            jwt_access_secret: config.jwt_access_secret.clone(),
            jwt_refresh_secret: config.jwt_refresh_secret.clone(),
            rate_limiter: crate::auth::rate_limit::RateLimiter::new(),
        })
    }
}
