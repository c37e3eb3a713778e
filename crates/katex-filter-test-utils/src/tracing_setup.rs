//! Tracing initialisation helpers for tests.
//!
//! The subscriber is initialised at most once per process, so it is safe to
//! call [`init_test_tracing`] from every test function.

use katex_filter_core::{LogCollector, LogReader};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialise a tracing subscriber that writes to the test-harness writer
/// and respects the `RUST_LOG` environment variable.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Capture every event emitted on this thread while the guard is alive.
///
/// Works with `#[tokio::test]`'s current-thread runtime, where spawned
/// tasks run on the test thread too.
///
/// ```ignore
/// let (logs, _guard) = capture_logs();
/// tracing::error!(tex = "x^", "TeX render failed");
/// assert!(logs.entries()[0].contains("x^"));
/// ```
pub fn capture_logs() -> (LogReader, DefaultGuard) {
    let collector = LogCollector::new(1024);
    let reader = collector.reader();
    let guard = tracing_subscriber::registry().with(collector).set_default();
    (reader, guard)
}
