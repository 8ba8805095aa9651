//! Tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

/// Install a stderr `fmt` subscriber
///
/// `RUST_LOG` takes precedence; otherwise library events are shown at `warn`,
/// or `debug` with `verbose`. Report output stays on stdout.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "cohortforge=debug" } else { "cohortforge=warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A subscriber may already be installed, e.g. by a test harness
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
