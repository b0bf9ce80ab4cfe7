//! Push and email notifications
//!
//! Delivery is best effort: [`Notifications::broadcast`] logs failures and
//! never hands them back to the command that finished its work.

use crate::config::NotifyConfig;
use crate::error::{CrabError, ErrorCode, Result};
use crate::subprocess::{ProcessCommandBuilder, SubprocessManager};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// POSTs the message body to an ntfy topic URL
pub struct NtfyNotifier {
    client: Client,
    url: String,
}

impl NtfyNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CrabError::config("failed to create HTTP client for ntfy").with_source(e))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    fn name(&self) -> &'static str {
        "ntfy"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("Title", subject)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                CrabError::external_tool(
                    ErrorCode::EXEC_HTTP_FAILED,
                    "ntfy request failed",
                    format!("POST {}", self.url),
                    None,
                    "",
                    e.to_string(),
                )
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(CrabError::external_tool(
                ErrorCode::EXEC_HTTP_FAILED,
                format!("ntfy returned {status}"),
                format!("POST {}", self.url),
                Some(i32::from(status.as_u16())),
                "",
                text,
            ))
        }
    }
}

/// Pipes an RFC 822 message to `sendmail -t`
pub struct EmailNotifier {
    subprocess: SubprocessManager,
    program: String,
    from: String,
    to: String,
}

impl EmailNotifier {
    pub fn new(
        subprocess: SubprocessManager,
        program: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self {
            subprocess,
            program: program.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn message(&self, subject: &str, body: &str) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\nContent-Type: text/plain; charset=utf-8\n\n{}\n",
            self.from,
            self.to,
            subject.replace(['\r', '\n'], " "),
            body
        )
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let command = ProcessCommandBuilder::new(&self.program)
            .arg("-t")
            .stdin(self.message(subject, body))
            .build();
        self.subprocess
            .run_checked(command, "Failed to send email")
            .await
            .map(|_| ())
    }
}

/// Every configured channel
#[derive(Default)]
pub struct Notifications {
    channels: Vec<Box<dyn Notifier>>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.channels.push(notifier);
        self
    }

    /// Channels enabled on the command line, addressed from configuration
    ///
    /// An enabled channel with no address is logged and left out.
    pub fn from_config(
        config: &NotifyConfig,
        subprocess: &SubprocessManager,
        email: bool,
        ntfy: bool,
    ) -> Self {
        let mut notifications = Self::new();
        if email {
            match &config.email_to {
                Some(to) => {
                    notifications = notifications.with(Box::new(EmailNotifier::new(
                        subprocess.clone(),
                        &config.sendmail_program,
                        &config.email_from,
                        to,
                    )));
                }
                None => tracing::error!(
                    "Email requested but no recipient configured (notify.email_to or CRAB_PILOT_EMAIL)"
                ),
            }
        }
        if ntfy {
            match config.ntfy_url.as_deref().map(NtfyNotifier::new) {
                Some(Ok(notifier)) => notifications = notifications.with(Box::new(notifier)),
                Some(Err(e)) => tracing::error!("ntfy disabled: {}", e),
                None => tracing::error!(
                    "ntfy requested but no topic URL configured (notify.ntfy_url or CRAB_PILOT_NTFY_URL)"
                ),
            }
        }
        notifications
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send to every channel; returns how many deliveries succeeded
    pub async fn broadcast(&self, subject: &str, body: &str) -> usize {
        let mut delivered = 0;
        for channel in &self.channels {
            match channel.send(subject, body).await {
                Ok(()) => {
                    tracing::debug!("Sent {} notification", channel.name());
                    delivered += 1;
                }
                Err(e) => tracing::error!(
                    "Failed to send {} notification: {}",
                    channel.name(),
                    e.developer_message()
                ),
            }
        }
        delivered
    }
}
