//! Logging bootstrap

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::LogConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. Returns false when a subscriber was
/// already installed, so tests may call this repeatedly.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = if config.json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        let config = LogConfig {
            level: "not a directive [".to_owned(),
            json: true,
        };
        init_logging(&config);
        assert!(!init_logging(&LogConfig::default()));
    }
}
