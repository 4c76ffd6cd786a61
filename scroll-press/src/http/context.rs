// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::bus::ServiceSender;
use crate::context::Context;
use crate::db::SqlStore;

/// Shared state for all HTTP routes.
#[derive(Clone)]
pub struct HttpServiceContext {
    /// Application wide context (store, config, injected clients).
    pub context: Context,

    /// Sender onto the communication bus, used to hand work to the DOI and email services.
    pub tx: ServiceSender,
}

impl HttpServiceContext {
    pub fn new(context: Context, tx: ServiceSender) -> Self {
        Self { context, tx }
    }

    pub fn store(&self) -> &SqlStore {
        &self.context.store
    }
}
