//! Configuration command implementations

use crate::cli::Output;
use crate::config::PressConfig;
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Display current merged configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
    /// Validate the merged configuration
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

pub async fn execute(args: ConfigArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    match args.command {
        ConfigCommand::Show { format } => {
            let config = PressConfig::load_with_custom_config(custom_config)?;
            println!("{}", render(&config, format)?);
        }
        ConfigCommand::Validate => {
            let config = PressConfig::load_with_custom_config(custom_config)
                .context("Configuration is invalid")?;

            output.success("Configuration is valid");
            output.key_value("Workers:", &config.resolve_pool_size().to_string(), true);
            output.key_value("Level:", &config.engine.level.to_string(), false);
            output.key_value("Prefix:", &config.output.prefix, false);
            let dir = if config.output.dir.is_empty() {
                "(next to each input)"
            } else {
                config.output.dir.as_str()
            };
            output.key_value("Output dir:", dir, false);
            output.key_value("PDF only:", &config.input.pdf_only.to_string(), false);
        }
    }

    Ok(())
}

fn render(config: &PressConfig, format: ConfigFormat) -> Result<String> {
    let rendered = match format {
        ConfigFormat::Toml => toml::to_string_pretty(config).context("Failed to render TOML")?,
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("Failed to render JSON")?
        }
        ConfigFormat::Yaml => serde_yml::to_string(config).context("Failed to render YAML")?,
    };
    Ok(rendered.trim_end().to_string())
}
