//! tracing subscriber setup for the binary.

use crate::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Logs go to stderr so stdout stays free for
/// Dockerfile and file output.
///
/// `RUST_LOG` wins over `config.filter`; `debug` raises the crate to `debug` level.
/// Calling this more than once is harmless.
pub fn init_tracing(config: &LoggingConfig, debug: bool) {
    let default_filter = if debug {
        "dockerfile_transform=debug".to_string()
    } else {
        config.filter.clone()
    };
    let env_filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!("tracing already initialized: {}", e);
    }
}
