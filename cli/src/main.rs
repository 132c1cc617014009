// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Gadget Portal CLI
//!
//! The `gadgetctl` binary runs an embedded portal node for the duration of a
//! command: it loads the configuration, bootstraps the node (which
//! reconciles persisted registrations) and performs one lifecycle operation.
//!
//! ## Commands
//!
//! - `gadgetctl gadget register|update|deregister|deregister-all|list|show|reconcile`
//! - `gadgetctl config show|validate|generate`

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

use gadget_portal_core::domain::portal_config::PortalConfigManifest;

mod commands;
mod embedded;

use commands::{ConfigCommand, GadgetCommand};

/// Gadget Portal - register and serve remote gadgets as portlets
#[derive(Parser)]
#[command(name = "gadgetctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "GADGET_PORTAL_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config value
    #[arg(long, global = true, env = "GADGET_PORTAL_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Gadget registration lifecycle
    #[command(name = "gadget")]
    Gadget {
        #[command(subcommand)]
        command: GadgetCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let logging = Logging::init(cli.log_level.as_deref().unwrap_or("info"))?;

    match cli.command {
        Some(Commands::Gadget { command }) => {
            let config = embedded::load_config(cli.config)?;
            logging.apply(&config, cli.log_level.is_some())?;
            commands::gadget::handle_command(command, config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

type FmtLayer = Box<dyn Layer<Registry> + Send + Sync>;
type FilteredRegistry = Layered<reload::Layer<FmtLayer, Registry>, Registry>;

/// Tracing subscriber installed before the configuration is read, so the
/// loader's own messages are emitted, and adjusted once it has been read.
struct Logging {
    filter: reload::Handle<EnvFilter, FilteredRegistry>,
    format: reload::Handle<FmtLayer, Registry>,
    level_from_env: bool,
}

impl Logging {
    fn init(level: &str) -> Result<Self> {
        let level_from_env = std::env::var_os(EnvFilter::DEFAULT_ENV).is_some();
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .context("Failed to create log filter")?;

        let (format_layer, format) = reload::Layer::new(fmt_layer(DEFAULT_LOG_FORMAT));
        let (filter_layer, filter) = reload::Layer::new(filter);
        tracing_subscriber::registry()
            .with(format_layer)
            .with(filter_layer)
            .try_init()
            .context("Failed to install log subscriber")?;

        Ok(Self {
            filter,
            format,
            level_from_env,
        })
    }

    /// Switch to the configured level and format; `RUST_LOG` and `--log-level` win
    fn apply(&self, config: &PortalConfigManifest, level_from_flag: bool) -> Result<()> {
        if let Some(level) = configured_level(config.log_level(), level_from_flag || self.level_from_env) {
            let filter = EnvFilter::try_new(level).context("Invalid log level in configuration")?;
            self.filter
                .reload(filter)
                .context("Failed to apply configured log level")?;
        }

        if config.log_format() != DEFAULT_LOG_FORMAT {
            self.format
                .reload(fmt_layer(config.log_format()))
                .context("Failed to apply configured log format")?;
        }

        Ok(())
    }
}

const DEFAULT_LOG_FORMAT: &str = "text";

fn configured_level(level: &str, pinned: bool) -> Option<&str> {
    if pinned {
        None
    } else {
        Some(level)
    }
}

fn fmt_layer(format: &str) -> FmtLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        layer.json().boxed()
    } else {
        layer.compact().boxed()
    }
}
