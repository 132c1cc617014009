// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Embedded node
//!
//! Creates the portal services in-process for the duration of one command.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use gadget_portal_core::application::GadgetPortal;
use gadget_portal_core::domain::portal_config::PortalConfigManifest;

pub fn load_config(config_path: Option<PathBuf>) -> Result<PortalConfigManifest> {
    let config = PortalConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

pub async fn start_node(config: PortalConfigManifest) -> Result<GadgetPortal> {
    debug!(node = %config.node_id(), "Starting embedded portal node");
    GadgetPortal::bootstrap(config)
        .await
        .context("Failed to start portal node")
}
