//! CLI argument definitions for loghaul-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use loghaul_core::config::LoghaulConfig;

/// loghaul log ingestion daemon.
///
/// Accepts framed log records from remote producers over TCP and
/// hands them to a shared queue.
#[derive(Parser, Debug)]
#[command(name = "loghaul-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to loghaul.toml configuration file.
    #[arg(short, long, default_value = "/etc/loghaul/loghaul.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override ingest port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of the file and environment configuration.
    pub fn apply_overrides(&self, config: &mut LoghaulConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(port) = self.port {
            config.ingest.port = port;
        }
    }
}
