//! Logging setup shared by the binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Filter used when `RUST_LOG` is not set
pub fn default_directives(level: &str) -> String {
    format!("co2_dashboard={level},co2_sensor_server={level},tower_http={level}")
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr so they never interleave with the chart on stdout.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let directives = default_directives("debug");
        assert_eq!(
            directives,
            "co2_dashboard=debug,co2_sensor_server=debug,tower_http=debug"
        );
        // Must be accepted by the filter parser
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
