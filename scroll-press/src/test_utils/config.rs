// SPDX-License-Identifier: AGPL-3.0-or-later

use once_cell::sync::Lazy;

use crate::config::Configuration;

/// Configuration used in tests, read from the environment with sane defaults.
pub static TEST_CONFIG: Lazy<Configuration> = Lazy::new(|| Configuration {
    database_url: std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".into()),
    ..Configuration::default()
});
