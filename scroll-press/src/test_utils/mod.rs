// SPDX-License-Identifier: AGPL-3.0-or-later

//! Helpers for writing tests against a fresh database and a running router.
mod client;
mod config;
mod db;
mod helpers;
mod runner;

pub use client::{http_test_client, http_test_client_with_bus, TestClient};
pub use config::TEST_CONFIG;
pub use db::{initialize_db, initialize_db_with_url};
pub use helpers::{add_subject, add_user, login_session, test_draft, MockRegistrar};
pub use runner::{test_runner, test_runner_with_registrar, TestPress};
