// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::email::OutboundEmail;
use crate::manager::Sender;
use crate::scrolls::ScrollId;

/// Sender for cross-service communication bus.
pub type ServiceSender = Sender<ServiceMessage>;

/// Messages which can be sent on the communication bus.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServiceMessage {
    /// A scroll transitioned into the published state.
    ///
    /// The DOI service reacts by queueing a mint task, the email service by notifying the
    /// admin address.
    ScrollPublished(ScrollId),

    /// A request handler asks for an email to be delivered asynchronously.
    EmailRequested(OutboundEmail),
}
