use tracing_subscriber::{prelude::*, util::SubscriberInitExt, EnvFilter};

/// Logs go to stderr, since stdout carries the JSON output.
pub fn init() {
    tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_filter(EnvFilter::from_default_env()),
        )
        .init();
}
