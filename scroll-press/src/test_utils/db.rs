// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::db::{connection_pool, create_database, run_pending_migrations, Pool};
use crate::test_utils::TEST_CONFIG;

/// Create test database.
pub async fn initialize_db() -> Pool {
    initialize_db_with_url(&TEST_CONFIG.database_url).await
}

/// Create test database with all migrations applied.
///
/// The pool is limited to a single connection: an in-memory SQLite database exists per
/// connection, a larger pool would hand out blank databases next to the migrated one.
pub async fn initialize_db_with_url(url: &str) -> Pool {
    create_database(url).await.unwrap();

    let pool = connection_pool(url, 1).await.unwrap();
    if run_pending_migrations(&pool).await.is_err() {
        pool.close().await;
    }

    pool
}
