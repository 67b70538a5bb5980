//! Tracing setup for hosts without their own subscriber.

use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

const DEFAULT_FILTER: &str = "error,mosaic_feed=info";

/// Installs a formatted `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Otherwise only errors are shown, plus
/// `mosaic_feed` at info level. Does nothing when a global subscriber is
/// already installed.
pub fn init_tracing() {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match EnvFilter::try_new(DEFAULT_FILTER) {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("error"),
        },
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!("tracing initialized twice");
    }
}
