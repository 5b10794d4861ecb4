//! Tracing subscriber setup for the binary

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Output goes to stderr so that
/// reports printed on stdout stay machine readable.
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let layer = fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        // A subscriber may already be installed when embedded
        let _ = registry.with(layer).try_init();
    } else {
        let layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = registry.with(layer).try_init();
    }
}
