// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context as AnyhowContext, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;
use thiserror::Error;

use crate::config::SmtpConfiguration;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Could not build email message: {0}")]
    Message(String),

    #[error("Could not deliver email: {0}")]
    Transport(String),
}

/// Outbound SMTP transport, constructed once at startup.
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,

    /// Recipient of admin notifications, when configured.
    pub admin_email: Option<String>,
}

impl Mailer {
    /// Builds a mailer from configuration.
    pub fn from_config(config: &SmtpConfiguration) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(&config.url)
            .context("Invalid SMTP url")?
            .build();

        let from = format!("Scroll Press <{}>", config.from_address)
            .parse()
            .context("Invalid sender address")?;

        Ok(Self {
            transport,
            from,
            admin_email: config.admin_email.clone(),
        })
    }

    /// Sends a message with both an HTML and a plain text body.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html: String,
        text: String,
    ) -> Result<(), MailError> {
        let to: Mailbox = to.parse().map_err(|err| {
            MailError::Message(format!("invalid recipient address: {}", err))
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))
            .map_err(|err| MailError::Message(err.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        info!("Sent email '{}'", subject);

        Ok(())
    }
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("from", &self.from.to_string())
            .field("admin_email", &self.admin_email)
            .finish()
    }
}
