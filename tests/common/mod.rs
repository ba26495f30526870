//! Shared test helpers.

use std::sync::Once;

static INIT: Once = Once::new();

/// Route tracing diagnostics (skipped records, dropped orphans, flush
/// events) to the test writer. Honors `RUST_LOG`; defaults to debug for
/// this crate so recovery paths are visible when a test fails.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("agent_sessions=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
