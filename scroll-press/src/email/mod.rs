// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transactional email: templates, SMTP transport and the bus-driven delivery service.
pub mod mailer;
pub mod service;
pub mod templates;

pub use mailer::{MailError, Mailer};
pub use service::{email_service, OutboundEmail};
