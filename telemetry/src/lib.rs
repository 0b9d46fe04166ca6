//! Tracing initialization shared by binaries and tests.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Log filter used by tests when `RUST_LOG` is not set.
const DEFAULT_TEST_FILTER: &str = "bulk=debug,info";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for an application.
///
/// Levels come from `RUST_LOG`, falling back to `info` for everything and `debug` for the
/// crate named by `app_name`. Fails when a global subscriber is already installed.
pub fn init_tracing(app_name: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_FILTER},{app_name}=debug")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Installs a tracing subscriber suited to tests.
///
/// Output goes through the test writer so it is captured per test. Safe to call from every
/// test: only the first call installs the subscriber.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
