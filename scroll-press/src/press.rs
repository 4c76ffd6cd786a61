// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use anyhow::Result;
use log::warn;

use crate::bus::ServiceMessage;
use crate::config::Configuration;
use crate::context::Context;
use crate::db::SqlStore;
use crate::db::{connection_pool, create_database, run_pending_migrations, Pool};
use crate::doi::{doi_service, DoiRegistrar, ZenodoRegistrar};
use crate::email::{email_service, Mailer};
use crate::http::http_service;
use crate::manager::ServiceManager;

/// Capacity of the internal broadcast channel used to communicate between services.
const SERVICE_BUS_CAPACITY: usize = 512_000;

/// Makes sure database is created and migrated before returning connection pool.
async fn initialize_db(config: &Configuration) -> Result<Pool> {
    // Find SSL certificate locations on the system for OpenSSL for TLS
    openssl_probe::init_ssl_cert_env_vars();

    // Create database when not existing
    create_database(&config.database_url).await?;

    // Create connection pool
    let pool = connection_pool(&config.database_url, config.database_max_connections).await?;

    // Run pending migrations
    run_pending_migrations(&pool).await?;

    Ok(pool)
}

/// Main runtime managing the Scroll Press server process.
pub struct Press {
    pool: Pool,
    manager: ServiceManager<Context, ServiceMessage>,
}

impl Press {
    /// Start the Scroll Press server with your configuration. This method can be used to run
    /// the server within other applications.
    pub async fn start(config: Configuration) -> Self {
        // Initialize database and get connection pool
        let pool = initialize_db(&config)
            .await
            .expect("Could not initialize database");

        // Prepare storage using connection pool
        let store = SqlStore::new(pool.clone());

        // Construct the injected collaborators exactly once. Unconfigured deployments run
        // without them: no emails, no DOI minting.
        let mailer = match &config.smtp {
            Some(smtp) => Some(Arc::new(
                Mailer::from_config(smtp).expect("Could not initialize SMTP transport"),
            )),
            None => {
                warn!("No SMTP configuration given, emails will not be delivered");
                None
            }
        };

        let registrar: Option<Arc<dyn DoiRegistrar>> = match &config.zenodo {
            Some(zenodo) => Some(Arc::new(
                ZenodoRegistrar::new(zenodo.clone())
                    .expect("Could not initialize Zenodo client"),
            )),
            None => {
                warn!("No Zenodo configuration given, published scrolls will not receive DOIs");
                None
            }
        };

        // Create service manager with shared data between services
        let context = Context::new(store, config, mailer, registrar);
        let mut manager =
            ServiceManager::<Context, ServiceMessage>::new(SERVICE_BUS_CAPACITY, context);

        // Start DOI minting service
        if manager.add("doi", doi_service).await.is_err() {
            panic!("Failed starting DOI service");
        }

        // Start email delivery service
        if manager.add("email", email_service).await.is_err() {
            panic!("Failed starting email service");
        }

        // Start HTTP server with the web application
        if manager.add("http", http_service).await.is_err() {
            panic!("Failed starting HTTP service");
        }

        Self { pool, manager }
    }

    /// This future resolves when at least one system service stopped.
    ///
    /// It can be used to exit the application as a stopped service usually means that something
    /// went wrong.
    pub async fn on_exit(&self) {
        self.manager.on_exit().await;
    }

    /// Close all running concurrent tasks and wait until they are fully shut down.
    pub async fn shutdown(self) {
        // Wait until all tasks are shut down
        self.manager.shutdown().await;

        // Close connection pool
        self.pool.close().await;
    }
}
