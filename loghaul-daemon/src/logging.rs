//! `tracing` subscriber setup.
//!
//! Output format and default level come from `[general]`; `RUST_LOG`
//! overrides the level when present.

use anyhow::{Result, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use loghaul_core::config::GeneralConfig;

type FormatLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the output layer for `log_format` (`json` or `pretty`).
fn format_layer(log_format: &str) -> Result<FormatLayer> {
    Ok(match log_format {
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        "pretty" => tracing_subscriber::fmt::layer().pretty().boxed(),
        other => bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    })
}

/// Level filter: `RUST_LOG` first, then the configured level.
fn level_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("invalid log level '{log_level}': {e}"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let layer = format_layer(&config.log_format)?;
    let filter = level_filter(&config.log_level)?;

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_format() {
        let config = GeneralConfig {
            log_level: "info".to_owned(),
            log_format: "xml".to_owned(),
        };
        let err = init_tracing(&config).unwrap_err();
        assert!(err.to_string().contains("unknown log format"));
    }

    #[test]
    fn known_formats_build() {
        assert!(format_layer("json").is_ok());
        assert!(format_layer("pretty").is_ok());
    }
}
