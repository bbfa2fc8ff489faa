use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Installs the global subscriber once; falls back to `prevention_analytics=info`
/// when the filter does not parse.
pub fn init_tracing(filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(filter)
            .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));

        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    });
}
