// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use gadget_portal_core::domain::portal_config::{PortalConfigManifest, StorageKind};

use crate::embedded;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./gadget-portal.yaml)
        #[arg(short, long, default_value = "./gadget-portal.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = PortalConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. GADGET_PORTAL_CONFIG: {}",
            std::env::var("GADGET_PORTAL_CONFIG")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./gadget-portal.yaml");
        println!("  4. ~/.gadget-portal/config.yaml");
        println!("  5. /etc/gadget-portal/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Node Identity:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  ID: {}", config.spec.node.id);
    println!();

    println!("{}", "Storage:".bold());
    match config.spec.storage.backend {
        StorageKind::InMemory => println!("  Backend: in_memory {}", "(not persisted)".dimmed()),
        StorageKind::Postgres => {
            println!("  Backend: postgres");
            println!("  Max connections: {}", config.spec.storage.max_connections);
        }
    }
    println!();

    let gadgets = &config.spec.gadgets;
    println!("{}", "Gadgets:".bold());
    println!("  Template portlet: {}", gadgets.template_portlet_id);
    println!("  Invoker portlet name: {}", gadgets.invoker_portlet_name);
    println!("  Portlet app: {}", gadgets.portlet_app);
    println!("  Fetch timeout: {} ms", gadgets.fetch_timeout_ms);
    println!("  Credential key prefix: {}", gadgets.credential_key_prefix);
    println!();

    println!("{}", "Cluster:".bold());
    println!("  Event capacity: {}", config.spec.cluster.event_capacity);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    embedded::load_config(config_path)?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
