// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remote gadget definition port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The parts of a remote gadget definition the portal cares about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GadgetDefinition {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl GadgetDefinition {
    /// Display name for the registration, falling back to the source URL
    pub fn display_name(&self, url: &str) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            url.to_string()
        } else {
            title.to_string()
        }
    }
}

#[async_trait]
pub trait GadgetDefinitionFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<GadgetDefinition, FetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid gadget URL: {0}")]
    InvalidUrl(String),

    #[error("gadget source unreachable: {0}")]
    Unreachable(String),

    #[error("gadget source returned HTTP {0}")]
    Status(u16),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("malformed gadget definition: {0}")]
    Malformed(String),
}
