//! Shared helpers for runsync's integration tests: an on-disk facility
//! builder, recording fakes for the pluggable backends, and tracing setup.

pub mod builders;
pub mod fakes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Upper bound for one simulated invocation. Everything runs against a
/// temp dir, so anything slower is a hang.
pub const INVOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialise tracing for tests.
///
/// Logs are captured per test with `with_test_writer()` and only shown for
/// failing tests (or with `-- --nocapture`). Override the filter with
/// `RUST_LOG`, e.g. `RUST_LOG=runsync=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,runsync=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future, failing the test if it outlives [`INVOCATION_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(INVOCATION_TIMEOUT, f)
        .await
        .expect("invocation timed out")
}
