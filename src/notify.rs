use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{Config, MailConfig};
use crate::redact;
use crate::templates::EmailMessage;

pub const MAX_RETRIES: u32 = 3;
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff duration (60 seconds)
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Delivers traveler emails
pub trait Mailer {
    fn send(&self, to: &str, message: &EmailMessage) -> impl Future<Output = Result<()>> + Send;
}

/// Build the form body for the mail API (credentials go in the auth header)
pub fn build_mail_params(
    from: &str,
    to: &str,
    bcc: Option<&str>,
    message: &EmailMessage,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("from", from.to_string()),
        ("to", to.to_string()),
        ("subject", message.subject.clone()),
        ("text", message.body.clone()),
    ];
    if let Some(bcc) = bcc {
        params.push(("bcc", bcc.to_string()));
    }
    params
}

/// Calculate backoff duration for a given attempt (0-indexed)
/// Attempt 0: no backoff, Attempt 1: 1s, Attempt 2: 2s, etc.
/// Capped at MAX_BACKOFF_MS to prevent overflow and excessive waits.
#[inline]
pub fn calculate_backoff(attempt: u32) -> Duration {
    if attempt == 0 {
        Duration::ZERO
    } else {
        // Cap shift to prevent overflow (max safe shift for u64 is 63)
        let shift = (attempt - 1).min(30);
        let backoff_ms = INITIAL_BACKOFF_MS.saturating_mul(1u64 << shift);
        Duration::from_millis(backoff_ms.min(MAX_BACKOFF_MS))
    }
}

/// Mail API error types for retry decisions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MailErrorKind {
    /// Transient error - safe to retry
    Transient,
    /// Permanent error - don't retry
    Permanent,
}

/// Email notifier backed by an HTTP mail API.
///
/// When email is not configured every message is logged instead of sent.
pub struct Notifier {
    client: reqwest::Client,
    mail: Option<MailConfig>,
}

impl Notifier {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            mail: config.mail.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mail.is_some()
    }

    pub async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<()> {
        let Some(mail) = &self.mail else {
            self.log_email_fallback(to, message);
            return Ok(());
        };

        info!("Sending email '{}' to {}", message.subject, redact::email(to));

        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let backoff = calculate_backoff(attempt);
                warn!("Email attempt {} failed, retrying in {:?}...", attempt, backoff);
                sleep(backoff).await;
            }

            match self.try_send(mail, to, message).await {
                Ok(()) => {
                    info!("Email sent successfully");
                    return Ok(());
                }
                Err(e) => {
                    if Self::classify_error(&e) == MailErrorKind::Permanent {
                        error!("Permanent mail error, not retrying: {}", e);
                        self.log_email_fallback(to, message);
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| anyhow::anyhow!("no send attempts were made"));
        error!("Failed to send email after {} attempts: {}", MAX_RETRIES, err);
        self.log_email_fallback(to, message);

        Err(err)
    }

    /// Classify an error as transient or permanent
    fn classify_error(err: &anyhow::Error) -> MailErrorKind {
        let msg = err.to_string().to_lowercase();

        // Rejected credentials or a malformed message won't improve on retry
        if msg.contains("status=400")
            || msg.contains("status=401")
            || msg.contains("status=403")
            || msg.contains("invalid address")
        {
            return MailErrorKind::Permanent;
        }

        MailErrorKind::Transient
    }

    /// Fallback logging when an email cannot be sent
    fn log_email_fallback(&self, to: &str, message: &EmailMessage) {
        error!(
            "EMAIL FALLBACK (mail unavailable) to {}: {}\n{}",
            redact::email(to),
            message.subject,
            message.body
        );
    }

    async fn try_send(&self, mail: &MailConfig, to: &str, message: &EmailMessage) -> Result<()> {
        let params = build_mail_params(&mail.from, to, mail.bcc.as_deref(), message);

        let response = self
            .client
            .post(&mail.api_url)
            .basic_auth("api", Some(&mail.api_key))
            .form(&params)
            .send()
            .await
            .context("Failed to send mail request")?;

        let status = response.status();
        if status.is_success() {
            debug!("Mail API accepted message ({})", status);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mail API error: status={} body={}", status.as_u16(), body.trim())
        }
    }
}

impl Mailer for Notifier {
    async fn send(&self, to: &str, message: &EmailMessage) -> Result<()> {
        self.send_email(to, message).await
    }
}

/// Send an email, logging rather than returning any failure
pub async fn send_best_effort<M: Mailer>(mailer: &M, to: Option<&str>, message: &EmailMessage) {
    let Some(to) = to else {
        debug!("No notification address; skipping '{}'", message.subject);
        return;
    };
    if let Err(e) = mailer.send(to, message).await {
        warn!("Unable to send '{}' email: {:#}", message.subject, e);
    }
}
