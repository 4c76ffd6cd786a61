// SPDX-License-Identifier: AGPL-3.0-or-later

use std::panic;
use std::sync::Arc;

use futures::Future;
use tokio::runtime::Builder;

use crate::context::Context;
use crate::db::SqlStore;
use crate::doi::DoiRegistrar;
use crate::test_utils::initialize_db;
use crate::Configuration;

/// Container for everything a test needs to exercise the press.
pub struct TestPress {
    pub context: Context,
}

#[async_trait::async_trait]
pub trait AsyncTestFn {
    async fn call(self, press: TestPress);
}

#[async_trait::async_trait]
impl<FN, F> AsyncTestFn for FN
where
    FN: FnOnce(TestPress) -> F + Sync + Send,
    F: Future<Output = ()> + Send,
{
    async fn call(self, press: TestPress) {
        self(press).await
    }
}

/// Provides a safe way to write tests using a database which closes the pool connection
/// automatically when the test succeeds or fails.
///
/// Takes an (async) test function as an argument and passes over the `TestPress` instance so
/// it can be used inside of it.
pub fn test_runner<F: AsyncTestFn + Send + Sync + 'static>(test: F) {
    test_runner_with_context(None, test)
}

/// Like [`test_runner`] but with an injected DOI registrar double.
pub fn test_runner_with_registrar<R, F>(registrar: R, test: F)
where
    R: DoiRegistrar + 'static,
    F: AsyncTestFn + Send + Sync + 'static,
{
    test_runner_with_context(Some(Arc::new(registrar)), test)
}

fn test_runner_with_context<F: AsyncTestFn + Send + Sync + 'static>(
    registrar: Option<Arc<dyn DoiRegistrar>>,
    test: F,
) {
    let runtime = Builder::new_current_thread()
        .worker_threads(1)
        .enable_all()
        .thread_name("with_db_teardown")
        .build()
        .expect("Could not build tokio Runtime for test");

    runtime.block_on(async {
        // Initialise store
        let pool = initialize_db().await;
        let store = SqlStore::new(pool);

        // Construct the actual test press
        let press = TestPress {
            context: Context::new(store.clone(), Configuration::default(), None, registrar),
        };

        // Get a handle of the underlying database connection pool
        let pool = press.context.store.pool.clone();

        // Spawn the test in a separate task to make sure we have control over the possible
        // panics which might happen inside of it
        let handle = tokio::task::spawn(async move {
            // Execute the actual test
            test.call(press).await;
        });

        // Get a handle of the task so we can use it later
        let result = handle.await;

        // Unwind the test by closing down the connection to the database pool. This will be
        // reached even when the test panicked
        pool.close().await;

        // Panic here when test failed. The test fails within its own async task and stays
        // there, we need to propagate it further to inform the test runtime about the result
        match result {
            Ok(_) => (),
            Err(err) => panic::resume_unwind(err.into_panic()),
        };
    });
}
