//! # Config Subcommand
//!
//! Prints the configuration the engine would run with: defaults, overlaid
//! by `--file`, overlaid by `MOORING_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use mooring_anchor::AnchorConfig;

/// Arguments for the `mooring config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// YAML or JSON config file.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,
}

/// How to render the configuration.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Execute the config subcommand.
pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    let config = AnchorConfig::load(args.file.as_deref()).context("failed to load configuration")?;
    print!("{}", render(&config, args.format)?);
    Ok(0)
}

/// Render `config` in `format`.
pub fn render(config: &AnchorConfig, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(config).context("failed to render YAML"),
        OutputFormat::Json => {
            let mut out =
                serde_json::to_string_pretty(config).context("failed to render JSON")?;
            out.push('\n');
            Ok(out)
        }
    }
}
