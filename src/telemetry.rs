//! Logging setup
//!
//! Plain `tracing` output filtered by `RUST_LOG`. Probes log their progress
//! at `debug`, case results at `info`.
//!
//! ```no_run
//! kube_smoke::telemetry::init_logging();
//! ```

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset; the kube client is chatty at info
const DEFAULT_FILTER: &str = "info,kube=warn,tower=warn,hyper=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Send logs to stderr
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Send logs through the test harness, so they show up only for failing tests
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_test_logging();
        init_logging();
        init_test_logging();
    }
}
