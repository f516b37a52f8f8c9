//! services/api/src/adapters/mailer.rs
//!
//! Outbound email. `ResendMailer` delivers through the Resend HTTP API;
//! `LogMailer` only logs, for development setups without an API key.

use async_trait::async_trait;
use cookstack_core::Mailer;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{error, info};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: SecretString,
    from: String,
}

impl ResendMailer {
    pub fn new(client: reqwest::Client, api_key: SecretString, from: String) -> Self {
        Self {
            client,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> bool {
        let body = ResendEmail {
            from: &self.from,
            to: [to],
            subject,
            html,
        };

        let result = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(subject, "Email sent");
                true
            }
            Ok(response) => {
                error!(status = %response.status(), subject, "Email provider rejected the message");
                false
            }
            Err(e) => {
                error!(error = %e, subject, "Failed to reach the email provider");
                false
            }
        }
    }
}

/// Writes emails to the log instead of sending them.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> bool {
        info!(to, subject, "Email delivery disabled, logging message:\n{}", html);
        true
    }
}
