// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Portal Configuration Types
//
// Defines the configuration schema for a gadget portal node:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Node identity used for cluster event origin
// - Storage backend selection (in-memory or PostgreSQL)
// - Gadget materialization settings (template portlet, fetch timeout)
// - Cluster channel sizing and logging settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::events::NodeId;
use crate::domain::portlet::PortletId;
use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "gadget-portal/v1";
pub const KIND: &str = "PortalConfig";

/// Top-level Kubernetes-style portal configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfigManifest {
    /// API version (must be "gadget-portal/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PortalConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: PortalConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfigSpec {
    #[serde(default)]
    pub node: NodeIdentity,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub gadgets: GadgetConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// Unique stable node identifier (UUID recommended)
    pub id: String,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[default]
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,

    /// PostgreSQL connection string (required for the postgres backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::InMemory,
            connection_string: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GadgetConfig {
    /// Container template every gadget portlet is built from
    #[serde(default = "default_template_portlet_id")]
    pub template_portlet_id: String,

    /// Invoker portlet name stamped into init params
    #[serde(default = "default_invoker_portlet_name")]
    pub invoker_portlet_name: String,

    /// Portlet application that owns gadget portlets
    #[serde(default = "default_portlet_app")]
    pub portlet_app: String,

    /// Upper bound for fetching a remote gadget definition
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Prefix of the key credential grants are issued under
    #[serde(default = "default_credential_key_prefix")]
    pub credential_key_prefix: String,
}

impl Default for GadgetConfig {
    fn default() -> Self {
        Self {
            template_portlet_id: default_template_portlet_id(),
            invoker_portlet_name: default_invoker_portlet_name(),
            portlet_app: default_portlet_app(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            credential_key_prefix: default_credential_key_prefix(),
        }
    }
}

impl GadgetConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn template_id(&self) -> PortletId {
        PortletId::from_container(self.template_portlet_id.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Events buffered per subscriber before lagging receivers drop old ones
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_max_connections() -> u32 {
    5
}

fn default_template_portlet_id() -> String {
    "2_WAR_opensocialportlet".to_string()
}

fn default_invoker_portlet_name() -> String {
    "2".to_string()
}

fn default_portlet_app() -> String {
    "opensocial-portlet".to_string()
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_credential_key_prefix() -> String {
    "published_".to_string()
}

fn default_event_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for PortalConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "gadget-portal".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                labels: None,
            },
            spec: PortalConfigSpec::default(),
        }
    }
}

impl PortalConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. GADGET_PORTAL_CONFIG environment variable
    /// 2. ./gadget-portal.yaml (working directory)
    /// 3. ~/.gadget-portal/config.yaml (user home)
    /// 4. /etc/gadget-portal/config.yaml (Unix only)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GADGET_PORTAL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./gadget-portal.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".gadget-portal").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/gadget-portal/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path: fail if missing/invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("GADGET_PORTAL_DATABASE_URL") {
            tracing::info!("Environment override: GADGET_PORTAL_DATABASE_URL");
            self.spec.storage.backend = StorageKind::Postgres;
            self.spec.storage.connection_string = Some(url);
        }

        if let Ok(val) = std::env::var("GADGET_PORTAL_FETCH_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: GADGET_PORTAL_FETCH_TIMEOUT_MS={}", ms);
                    self.spec.gadgets.fetch_timeout_ms = ms;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for GADGET_PORTAL_FETCH_TIMEOUT_MS: '{}'. Expected milliseconds. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.spec.node.id.trim().is_empty() {
            anyhow::bail!("spec.node.id must not be empty");
        }

        if self.spec.gadgets.template_portlet_id.trim().is_empty() {
            anyhow::bail!("spec.gadgets.template_portlet_id must not be empty");
        }

        if self.spec.gadgets.fetch_timeout_ms == 0 {
            anyhow::bail!("spec.gadgets.fetch_timeout_ms must be greater than zero");
        }

        if self.spec.cluster.event_capacity == 0 {
            anyhow::bail!("spec.cluster.event_capacity must be greater than zero");
        }

        if self.spec.storage.backend == StorageKind::Postgres
            && self
                .spec
                .storage
                .connection_string
                .as_deref()
                .map_or(true, |s| s.trim().is_empty())
        {
            anyhow::bail!("spec.storage.connection_string is required for the postgres backend");
        }

        Ok(())
    }

    pub fn node_id(&self) -> NodeId {
        NodeId(self.spec.node.id.clone())
    }

    /// Resolve the storage backend selection
    pub fn storage_backend(&self) -> StorageBackend {
        match (self.spec.storage.backend, &self.spec.storage.connection_string) {
            (StorageKind::Postgres, Some(connection_string)) => {
                StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string: connection_string.clone(),
                    max_connections: self.spec.storage.max_connections,
                })
            }
            _ => StorageBackend::InMemory,
        }
    }

    pub fn log_level(&self) -> &str {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
            .map(|l| l.level.as_str())
            .unwrap_or("info")
    }

    pub fn log_format(&self) -> &str {
        self.spec
            .observability
            .as_ref()
            .and_then(|o| o.logging.as_ref())
            .map(|l| l.format.as_str())
            .unwrap_or("text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
apiVersion: gadget-portal/v1
kind: PortalConfig
metadata:
  name: portal-a
spec:
  node:
    id: node-a
  storage:
    backend: postgres
    connection_string: postgres://portal@localhost/portal
  gadgets:
    fetch_timeout_ms: 2500
  cluster:
    event_capacity: 64
  observability:
    logging:
      level: debug
"#;

    #[test]
    fn test_parse_sample_with_defaults() {
        let config = PortalConfigManifest::from_yaml_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.node_id(), NodeId("node-a".to_string()));
        assert_eq!(config.spec.gadgets.fetch_timeout(), Duration::from_millis(2500));
        assert_eq!(config.spec.gadgets.template_portlet_id, "2_WAR_opensocialportlet");
        assert_eq!(config.spec.gadgets.credential_key_prefix, "published_");
        assert_eq!(config.spec.cluster.event_capacity, 64);
        assert_eq!(config.log_level(), "debug");
        assert_eq!(
            config.storage_backend(),
            StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: "postgres://portal@localhost/portal".to_string(),
                max_connections: 5,
            })
        );
    }

    #[test]
    fn test_default_is_valid_in_memory() {
        let config = PortalConfigManifest::default();
        config.validate().unwrap();
        assert_eq!(config.storage_backend(), StorageBackend::InMemory);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_validate_rejects_bad_manifest() {
        let mut config = PortalConfigManifest::default();
        config.kind = "NodeConfig".to_string();
        assert!(config.validate().is_err());

        let mut config = PortalConfigManifest::default();
        config.spec.storage.backend = StorageKind::Postgres;
        assert!(config.validate().is_err());

        let mut config = PortalConfigManifest::default();
        config.spec.gadgets.fetch_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip_via_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let loaded = PortalConfigManifest::from_yaml_file(file.path()).unwrap();
        assert_eq!(loaded.metadata.name, "portal-a");

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("portal.yaml");
        loaded.to_yaml_file(&out).unwrap();
        let reloaded = PortalConfigManifest::from_yaml_file(&out).unwrap();
        assert_eq!(reloaded.spec.node.id, "node-a");
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(PortalConfigManifest::load_or_default(Some(missing)).is_err());
    }
}
