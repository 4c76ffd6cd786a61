// SPDX-License-Identifier: AGPL-3.0-or-later

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::config::Configuration;
use crate::db::SqlStore;
use crate::doi::DoiRegistrar;
use crate::email::Mailer;

/// Inner data shared across all services.
///
/// The mailer and the registrar are constructed exactly once at startup and injected here,
/// request handlers and workers never reach for process-global clients. Both are optional:
/// an unconfigured deployment skips email delivery and DOI minting.
pub struct Data {
    /// Node configuration.
    pub config: Configuration,

    /// Storage with database connection pool.
    pub store: SqlStore,

    /// Outbound email transport.
    pub mailer: Option<Arc<Mailer>>,

    /// DOI registrar collaborator.
    pub registrar: Option<Arc<dyn DoiRegistrar>>,
}

impl Data {
    pub fn new(
        store: SqlStore,
        config: Configuration,
        mailer: Option<Arc<Mailer>>,
        registrar: Option<Arc<dyn DoiRegistrar>>,
    ) -> Self {
        Self {
            config,
            store,
            mailer,
            registrar,
        }
    }
}

/// Data shared across all services.
pub struct Context(pub Arc<Data>);

impl Context {
    /// Returns a new instance of `Context`.
    pub fn new(
        store: SqlStore,
        config: Configuration,
        mailer: Option<Arc<Mailer>>,
        registrar: Option<Arc<dyn DoiRegistrar>>,
    ) -> Self {
        Self(Arc::new(Data::new(store, config, mailer, registrar)))
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl Deref for Context {
    type Target = Data;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("mailer", &self.mailer.is_some())
            .field("registrar", &self.registrar.is_some())
            .finish()
    }
}
