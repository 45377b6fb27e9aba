//! Tracing subscriber shared by the binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs an `EnvFilter` + fmt subscriber writing to stderr.
///
/// Stdout stays free for tool output. Calling this twice is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
