// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Materialized Portlet Definitions
//!
//! A materialized portlet is the container-facing half of a gadget
//! registration. It is never persisted: it is derived from the registration
//! on demand and rebuilt after a restart.
//!
//! # Identity
//!
//! [`PortletId::derive`] maps an external identifier onto the container's
//! identifier namespace. The mapping is pure, so every cluster node derives
//! the same portlet id for the same gadget.
//!
//! # Construction
//!
//! Definitions are built from a [`PortletTemplate`] through
//! [`PortletDefinitionBuilder`] and are immutable once built.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::gadget::{ExternalId, TenantId};

/// Namespace tag prepended to every gadget portlet id
pub const PORTLET_NAME_PREFIX: &str = "OPENSOCIAL_";

/// Class binding stamped onto every gadget portlet
pub const GADGET_PORTLET_CLASS: &str = "gadget_portal::GadgetPortlet";

/// Init parameter naming the invoker portlet that dispatches requests
pub const INIT_INVOKER_PORTLET_NAME: &str = "com.liferay.portal.invokerPortletName";

pub const TEXT_HTML: &str = "text/html";

/// Marker separating non-UUID identifiers from canonical UUID ones
const OPAQUE_MARKER: char = 'X';

/// Hex digits of the SHA-256 digest kept for non-UUID identifiers
const DIGEST_SUFFIX_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PortletIdError {
    #[error("external identifier must not be empty")]
    Empty,
}

/// Container-safe portlet identifier (`[A-Za-z0-9_]` only)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortletId(String);

impl PortletId {
    /// Derive the local portlet id for an external identifier.
    ///
    /// UUIDs are canonicalised before derivation, so `ABC…` and `abc…` map
    /// to the same id. Any other identifier keeps a readable sanitised form
    /// and gains a digest suffix so that inputs that sanitise identically
    /// still map to distinct ids.
    pub fn derive(external_identifier: &str) -> Result<Self, PortletIdError> {
        let trimmed = external_identifier.trim();
        if trimmed.is_empty() {
            return Err(PortletIdError::Empty);
        }

        let mut id = String::from(PORTLET_NAME_PREFIX);

        if let Ok(uuid) = Uuid::parse_str(trimmed) {
            id.push_str(&uuid.hyphenated().to_string().replace('-', "_"));
            return Ok(Self(id));
        }

        id.push(OPAQUE_MARKER);
        id.extend(trimmed.chars().filter_map(|c| match c {
            '-' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => Some(c),
            _ => None,
        }));

        let digest = hex::encode(Sha256::digest(trimmed.as_bytes()));
        id.push('_');
        id.push_str(&digest[..DIGEST_SUFFIX_LEN]);

        Ok(Self(id))
    }

    pub fn for_external_id(external_id: &ExternalId) -> Self {
        let mut id = String::from(PORTLET_NAME_PREFIX);
        id.push_str(&external_id.0.hyphenated().to_string().replace('-', "_"));
        Self(id)
    }

    /// Wrap an id that is already in container form (e.g. a template id)
    pub fn from_container(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_container_safe(candidate: &str) -> bool {
        !candidate.is_empty()
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

impl std::fmt::Display for PortletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortletMode {
    View,
    Edit,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowState {
    Maximized,
    Minimized,
    Normal,
}

/// Localized display information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortletInfo {
    pub title: String,
    pub short_title: String,
    pub keywords: String,
    pub description: String,
}

impl PortletInfo {
    /// Every field carries the same text, as gadgets only expose one title
    pub fn uniform(text: &str) -> Self {
        Self {
            title: text.to_string(),
            short_title: text.to_string(),
            keywords: text.to_string(),
            description: text.to_string(),
        }
    }
}

/// Template definition the container hands out for gadget portlets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortletTemplate {
    pub template_id: PortletId,
    pub portlet_app: String,
    pub init_params: BTreeMap<String, String>,
}

impl PortletTemplate {
    pub fn new(template_id: PortletId, portlet_app: impl Into<String>) -> Self {
        Self {
            template_id,
            portlet_app: portlet_app.into(),
            init_params: BTreeMap::new(),
        }
    }
}

/// Fully formed, immutable portlet definition for one gadget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedPortletDefinition {
    portlet_id: PortletId,
    external_id: ExternalId,
    tenant_id: TenantId,
    display_name: String,
    portlet_class: String,
    portlet_app: String,
    init_params: BTreeMap<String, String>,
    portlet_modes: BTreeMap<String, BTreeSet<PortletMode>>,
    window_states: BTreeMap<String, BTreeSet<WindowState>>,
    info: PortletInfo,
}

impl MaterializedPortletDefinition {
    pub fn builder(template: PortletTemplate) -> PortletDefinitionBuilder {
        PortletDefinitionBuilder::new(template)
    }

    pub fn portlet_id(&self) -> &PortletId {
        &self.portlet_id
    }

    pub fn external_id(&self) -> ExternalId {
        self.external_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn portlet_class(&self) -> &str {
        &self.portlet_class
    }

    pub fn portlet_app(&self) -> &str {
        &self.portlet_app
    }

    pub fn init_params(&self) -> &BTreeMap<String, String> {
        &self.init_params
    }

    pub fn portlet_modes(&self, mime_type: &str) -> Option<&BTreeSet<PortletMode>> {
        self.portlet_modes.get(mime_type)
    }

    pub fn window_states(&self, mime_type: &str) -> Option<&BTreeSet<WindowState>> {
        self.window_states.get(mime_type)
    }

    pub fn info(&self) -> &PortletInfo {
        &self.info
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("portlet definition is missing {0}")]
    Missing(&'static str),
}

/// Builder replacing the template clone-then-mutate construction
#[derive(Debug)]
pub struct PortletDefinitionBuilder {
    template: PortletTemplate,
    portlet_id: Option<PortletId>,
    external_id: Option<ExternalId>,
    tenant_id: Option<TenantId>,
    display_name: Option<String>,
    invoker_portlet_name: Option<String>,
}

impl PortletDefinitionBuilder {
    fn new(template: PortletTemplate) -> Self {
        Self {
            template,
            portlet_id: None,
            external_id: None,
            tenant_id: None,
            display_name: None,
            invoker_portlet_name: None,
        }
    }

    pub fn portlet_id(mut self, portlet_id: PortletId) -> Self {
        self.portlet_id = Some(portlet_id);
        self
    }

    pub fn external_id(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn invoker_portlet_name(mut self, name: impl Into<String>) -> Self {
        self.invoker_portlet_name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<MaterializedPortletDefinition, BuildError> {
        let portlet_id = self.portlet_id.ok_or(BuildError::Missing("portlet id"))?;
        let external_id = self.external_id.ok_or(BuildError::Missing("external id"))?;
        let tenant_id = self.tenant_id.ok_or(BuildError::Missing("tenant"))?;
        let display_name = self.display_name.ok_or(BuildError::Missing("display name"))?;

        let mut init_params = self.template.init_params;
        if let Some(invoker) = self.invoker_portlet_name {
            init_params.insert(INIT_INVOKER_PORTLET_NAME.to_string(), invoker);
        }

        let mut portlet_modes = BTreeMap::new();
        portlet_modes.insert(TEXT_HTML.to_string(), BTreeSet::from([PortletMode::View]));

        let mut window_states = BTreeMap::new();
        window_states.insert(
            TEXT_HTML.to_string(),
            BTreeSet::from([WindowState::Maximized, WindowState::Minimized, WindowState::Normal]),
        );

        Ok(MaterializedPortletDefinition {
            info: PortletInfo::uniform(&display_name),
            portlet_id,
            external_id,
            tenant_id,
            display_name,
            portlet_class: GADGET_PORTLET_CLASS.to_string(),
            portlet_app: self.template.portlet_app,
            init_params,
            portlet_modes,
            window_states,
        })
    }
}

/// Request-scoped handler the container invokes to render a portlet
pub trait PortletHandler: Send + Sync {
    fn portlet_id(&self) -> &PortletId;

    fn render(&self) -> String;
}

pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn PortletHandler> + Send + Sync>;

/// Backing execution bag registered with the container per portlet.
///
/// Each invocation asks the factory for a fresh handler instance.
#[derive(Clone)]
pub struct PortletBag {
    pub portlet_name: PortletId,
    factory: HandlerFactory,
}

impl PortletBag {
    pub fn new(portlet_name: PortletId, factory: HandlerFactory) -> Self {
        Self { portlet_name, factory }
    }

    pub fn instantiate(&self) -> Box<dyn PortletHandler> {
        (self.factory)()
    }
}

impl std::fmt::Debug for PortletBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortletBag")
            .field("portlet_name", &self.portlet_name)
            .finish_non_exhaustive()
    }
}

/// Renders the gadget container markup for a materialized gadget portlet
pub struct GadgetPortletHandler {
    portlet_id: PortletId,
    title: String,
}

impl GadgetPortletHandler {
    pub fn new(portlet_id: PortletId, title: impl Into<String>) -> Self {
        Self {
            portlet_id,
            title: title.into(),
        }
    }

    /// Factory producing a fresh handler per invocation
    pub fn factory(definition: &MaterializedPortletDefinition) -> HandlerFactory {
        let portlet_id = definition.portlet_id().clone();
        let title = definition.info().title.clone();
        Arc::new(move || Box::new(GadgetPortletHandler::new(portlet_id.clone(), title.clone())))
    }
}

impl PortletHandler for GadgetPortletHandler {
    fn portlet_id(&self) -> &PortletId {
        &self.portlet_id
    }

    fn render(&self) -> String {
        format!(
            "<div class=\"gadget-portlet\" id=\"{}\" title=\"{}\"></div>",
            self.portlet_id,
            escape_attribute(&self.title)
        )
    }
}

fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
