// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::Result;
use log::{debug, error, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::bus::{ServiceMessage, ServiceSender};
use crate::context::Context;
use crate::email::templates::{
    admin_publish_notification, admin_signup_notification, password_reset_email,
    verification_email,
};
use crate::manager::{ServiceReadySender, Shutdown};

/// An email a request handler asked to be delivered.
///
/// Carried over the communication bus so the originating request never waits on the SMTP
/// round-trip and a delivery failure never turns into a request error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OutboundEmail {
    Verification {
        to: String,
        name: String,
        token: String,
    },
    PasswordReset {
        to: String,
        name: String,
        token: String,
    },
    AdminSignup {
        email: String,
        display_name: String,
        user_id: String,
    },
    AdminPublish {
        email: String,
        display_name: String,
        title: String,
        url_hash: String,
    },
}

/// Drains `EmailRequested` messages from the bus and delivers them.
pub async fn email_service(
    context: Context,
    shutdown: Shutdown,
    tx: ServiceSender,
    tx_ready: ServiceReadySender,
) -> Result<()> {
    let mut rx = tx.subscribe();
    let mut shutdown = shutdown;

    if context.mailer.is_none() {
        warn!("No SMTP transport configured, outbound emails will be logged and dropped");
    }

    if tx_ready.send(()).is_err() {
        warn!("No subscriber informed about email service being ready");
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            message = rx.recv() => match message {
                Ok(ServiceMessage::EmailRequested(email)) => {
                    deliver(&context, email).await;
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    error!("Email service lagging behind {} bus messages", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    Ok(())
}

async fn deliver(context: &Context, email: OutboundEmail) {
    let mailer = match &context.mailer {
        Some(mailer) => mailer,
        None => {
            debug!("Skipping email delivery: {:?}", email);
            return;
        }
    };

    let base_url = &context.config.base_url;

    let result = match &email {
        OutboundEmail::Verification { to, name, token } => {
            let (html, text) = verification_email(name, token, base_url);
            mailer
                .send(to, "Verify your Scroll Press email address", html, text)
                .await
        }
        OutboundEmail::PasswordReset { to, name, token } => {
            let (html, text) = password_reset_email(name, token, base_url);
            mailer
                .send(to, "Reset your Scroll Press password", html, text)
                .await
        }
        OutboundEmail::AdminSignup {
            email,
            display_name,
            user_id,
        } => match &mailer.admin_email {
            Some(admin) => {
                let (html, text) = admin_signup_notification(email, display_name, user_id);
                mailer
                    .send(admin, &format!("New Signup: {}", display_name), html, text)
                    .await
            }
            None => return,
        },
        OutboundEmail::AdminPublish {
            email,
            display_name,
            title,
            url_hash,
        } => match &mailer.admin_email {
            Some(admin) => {
                let url = format!("{}/scroll/{}", base_url, url_hash);
                let (html, text) =
                    admin_publish_notification(email, display_name, title, &url, url_hash);
                let subject: String = title.chars().take(50).collect();
                mailer
                    .send(admin, &format!("New Publication: {}", subject), html, text)
                    .await
            }
            None => return,
        },
    };

    // Delivery problems are logged, never surfaced to the request which queued the email
    if let Err(err) = result {
        error!("Failed to deliver email: {}", err);
    }
}
