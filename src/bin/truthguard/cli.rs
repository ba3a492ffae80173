//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use truthguard::ClientConfig;

/// Follow fact-check results written by the TruthGuard agent on Arweave.
#[derive(Parser, Debug)]
#[command(name = "truthguard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Gateway base URLs, in priority order.
    #[arg(
        long = "gateway",
        short,
        global = true,
        env = "TRUTHGUARD_GATEWAYS",
        value_delimiter = ','
    )]
    pub gateways: Vec<String>,

    /// Seconds between polling ticks.
    #[arg(long, global = true, env = "TRUTHGUARD_POLL_INTERVAL")]
    pub poll_interval: Option<u64>,

    /// Ticks before a session times out.
    #[arg(long, global = true, env = "TRUTHGUARD_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Log level.
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Poll for the result of a submitted claim until it arrives or times out.
    Poll {
        /// Transaction id of the submitted claim.
        request_id: String,
    },
    /// Look up the result of a submitted claim once.
    Lookup {
        /// Transaction id of the submitted claim.
        request_id: String,
    },
    /// Fetch and decode a result transaction directly.
    Fetch {
        /// Transaction id of the result.
        result_tx_id: String,
    },
    /// Write the default configuration file.
    InitConfig {
        /// Destination; defaults to the per-user config directory.
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Build the client configuration from the config file and CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded,
    /// or if the result is invalid.
    pub fn to_config(&self) -> color_eyre::Result<ClientConfig> {
        let mut config = if let Some(ref path) = self.config {
            ClientConfig::from_file(path)?
        } else {
            let default_path = ClientConfig::default_path();
            if default_path.exists() {
                ClientConfig::from_file(&default_path)?
            } else {
                ClientConfig::default()
            }
        };

        if !self.gateways.is_empty() {
            config.gateway.endpoints.clone_from(&self.gateways);
        }
        if let Some(interval) = self.poll_interval {
            config.polling.interval_secs = interval;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.polling.max_attempts = max_attempts;
        }
        config.log_level.clone_from(&self.log_level);

        config.validate()?;
        Ok(config)
    }
}
