//! Structured logging setup.
//!
//! Production-like environments log JSON at `info`; everything else logs
//! human-readable text at `debug`. `logging.level` in the config replaces
//! the default level, `logging.targets` appends per-target directives, and
//! `RUST_LOG` overrides all of it.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::FleetConfig;

/// Errors raised while installing the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A filter directive did not parse.
    #[error("invalid log filter `{directives}`: {source}")]
    Filter {
        /// The directives that were rejected.
        directives: String,
        /// The parser error.
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Filter directives derived from the config, ignoring `RUST_LOG`.
pub fn filter_directives(config: &FleetConfig) -> String {
    let base = config.logging.level.clone().unwrap_or_else(|| {
        if config.is_production() {
            "info".to_owned()
        } else {
            "debug".to_owned()
        }
    });

    config
        .logging
        .targets
        .iter()
        .fold(base, |mut acc, (target, level)| {
            acc.push(',');
            acc.push_str(target);
            acc.push('=');
            acc.push_str(level);
            acc
        })
}

/// Install the global `tracing` subscriber for the binary.
///
/// # Errors
///
/// Returns [`TelemetryError`] if the filter does not parse or a subscriber
/// is already installed.
pub fn init_tracing(config: &FleetConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        let directives = filter_directives(config);
        EnvFilter::try_new(&directives)
            .map_err(|source| TelemetryError::Filter { directives, source })
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.is_production() {
        builder.json().finish().try_init()?;
    } else {
        builder.finish().try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_follows_environment() {
        let mut config = FleetConfig::default();
        assert_eq!(filter_directives(&config), "debug");

        config.environment = "production".to_owned();
        assert_eq!(filter_directives(&config), "info");
    }

    #[test]
    fn targets_are_appended_in_order() {
        let mut config = FleetConfig::default();
        config.logging.level = Some("warn".to_owned());
        config
            .logging
            .targets
            .insert("tower_http".to_owned(), "debug".to_owned());
        config
            .logging
            .targets
            .insert("fleet_locator".to_owned(), "trace".to_owned());
        assert_eq!(
            filter_directives(&config),
            "warn,fleet_locator=trace,tower_http=debug"
        );
    }
}
