use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Stderr logging, filtered by `RUST_LOG` (default `info`). Stdout stays free for reports.
pub fn init_logger(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter_layer)
        .try_init();
}
