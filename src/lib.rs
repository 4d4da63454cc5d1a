pub mod collectors;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod pricing;
pub mod server;
pub mod signals;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `RUST_LOG` takes precedence over `level`. `format` is "text" or "json".
/// Later calls are ignored once a global subscriber is set.
pub fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Warning: tracing already initialized: {}", e);
    }
}
