//! Logging setup.
//!
//! All pipeline progress goes through `tracing`. `RUST_LOG` wins over the
//! `-v` count given on the command line.

use std::sync::Once;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Default filter directive for a `-v` count.
pub fn directive_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "distpack=info",
        1 => "distpack=debug",
        _ => "distpack=trace",
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbosity: u8) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directive_for(verbosity)));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_directives() {
        assert_eq!(directive_for(0), "distpack=info");
        assert_eq!(directive_for(1), "distpack=debug");
        assert_eq!(directive_for(7), "distpack=trace");
    }

    #[test]
    fn test_init_is_idempotent() {
        init(0);
        init(2);
    }
}
