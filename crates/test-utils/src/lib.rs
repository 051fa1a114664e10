//! Shared helpers for the `incbuild` integration tests.
//!
//! [`builders`] assembles validated configs without writing TOML, and
//! [`fakes`] stands in for the compiler, archiver and version control
//! collaborators so pipelines run against a mock filesystem.

pub mod builders;
pub mod fakes;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Route `tracing` output from the pipeline into the test harness.
///
/// Captured per test and shown only on failure. `RUST_LOG=incbuild=debug`
/// surfaces planner and executor decisions.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Bound a pipeline run so a hung exec task or worker fails the test.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("build did not finish within 5 seconds")
}
