//! Command line arguments
//!
//! Flags override whatever the config file or environment provided.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use entsync_domain::{AppConfig, InputFormat, Network};

/// Apply a batch of entitlement changes and snapshot the resulting roster.
#[derive(Debug, Parser)]
#[command(name = "entsync", version, about, long_about = None)]
pub struct Args {
    /// Config file (JSON or TOML). Without it the environment is tried first,
    /// then `config.{json,toml}` or `entsync.{json,toml}` in the working
    /// directory, then the same names next to the executable.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Input table of rows to apply
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Per-row results report
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Roster snapshot report
    #[arg(long)]
    pub roster: Option<PathBuf>,

    /// Input layout: legacy, permission or email
    #[arg(long)]
    pub format: Option<InputFormat>,

    /// Target network: WHATSAPP or WECHAT
    #[arg(long)]
    pub network: Option<Network>,

    /// Do not list entitlements or write the roster after the batch
    #[arg(long)]
    pub skip_roster: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Args {
    /// Overlay the flags that were given onto a loaded config.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(input) = &self.input {
            config.files.input.clone_from(input);
        }
        if let Some(output) = &self.output {
            config.files.output.clone_from(output);
        }
        if let Some(roster) = &self.roster {
            config.files.roster.clone_from(roster);
        }
        if let Some(format) = self.format {
            config.files.format = format;
        }
        if let Some(network) = self.network {
            config.api.network = network;
        }
    }
}
