//! Outbound email: SES in deployed environments, tracing-only in development
//!
//! All sends are best-effort. Callers log failures and never roll back
//! committed state because a notification did not go out.

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), BoxError>;
    async fn send_password_reset_code(&self, to: &str, code: &str) -> Result<(), BoxError>;
    async fn send_order_status_update(
        &self,
        to: &str,
        order_number: &str,
        status: &str,
    ) -> Result<(), BoxError>;
}

/// AWS SES v2 mailer
pub struct SesMailer {
    ses: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(ses: SesClient, from: String) -> Self {
        Self { ses, from }
    }

    async fn send_simple(&self, to: &str, subject: &str, body_text: String) -> Result<(), BoxError> {
        let subject = Content::builder().data(subject).build()?;

        let body = Body::builder()
            .text(Content::builder().data(body_text).build()?)
            .build();

        let message = Message::builder().subject(subject).body(body).build();

        self.ses
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), BoxError> {
        let body = format!(
            "Your FreshCart verification code is: {code}\n\
             Valid for 10 minutes."
        );
        self.send_simple(to, "Your verification code", body).await?;
        tracing::info!(to = to, "Verification code sent");
        Ok(())
    }

    async fn send_password_reset_code(&self, to: &str, code: &str) -> Result<(), BoxError> {
        let body = format!(
            "Your FreshCart password reset code is: {code}\n\
             Valid for 10 minutes.\n\n\
             If you did not request this, you can ignore this email."
        );
        self.send_simple(to, "Reset your password", body).await?;
        tracing::info!(to = to, "Password reset code sent");
        Ok(())
    }

    async fn send_order_status_update(
        &self,
        to: &str,
        order_number: &str,
        status: &str,
    ) -> Result<(), BoxError> {
        let body = format!("Your order {order_number} is now: {status}");
        self.send_simple(to, &format!("Order {order_number} update"), body)
            .await?;
        tracing::info!(to = to, order_number = order_number, "Order update sent");
        Ok(())
    }
}

/// Development mailer: logs instead of sending
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, to: &str, code: &str) -> Result<(), BoxError> {
        tracing::info!(to = to, code = code, "[dev] verification code");
        Ok(())
    }

    async fn send_password_reset_code(&self, to: &str, code: &str) -> Result<(), BoxError> {
        tracing::info!(to = to, code = code, "[dev] password reset code");
        Ok(())
    }

    async fn send_order_status_update(
        &self,
        to: &str,
        order_number: &str,
        status: &str,
    ) -> Result<(), BoxError> {
        tracing::info!(
            to = to,
            order_number = order_number,
            status = status,
            "[dev] order status update"
        );
        Ok(())
    }
}
