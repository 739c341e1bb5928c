//! Email service for sending verification links

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::EmailConfig;

/// Sends account emails over SMTP, or logs them when SMTP is disabled.
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.smtp_host.is_empty()
    }

    /// Link the user follows to verify their address
    pub fn verification_link(&self, token: &str) -> String {
        let separator = if self.config.verify_url.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", self.config.verify_url, separator, token)
    }

    /// Send the verification email in the background.
    ///
    /// Failures are logged; registration never fails because mail is down.
    pub fn dispatch_verification(self: &Arc<Self>, to_email: String, username: String, token: String) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.send_verification(&to_email, &username, &token).await {
                tracing::warn!("Failed to send verification email to {}: {}", to_email, e);
            }
        });
    }

    /// Send the verification email and wait for the SMTP exchange
    pub async fn send_verification(&self, to_email: &str, username: &str, token: &str) -> Result<()> {
        let link = self.verification_link(token);

        if !self.is_enabled() {
            tracing::info!("Email disabled; verification link for {}: {}", username, link);
            return Ok(());
        }

        let body = format!(
            "Hi {},\n\nWelcome to DD-bot! Please confirm your email address by opening the link below:\n\n{}\n\nThe link expires soon. If you did not sign up, you can ignore this email.\n",
            username, link
        );

        let email = Message::builder()
            .from(self.config.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject("Verify your DD-bot account")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let mailer: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::debug!("Verification email sent to {}", to_email);
        Ok(())
    }
}
