// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gadget Registration Aggregate
//!
//! A gadget is an externally hosted widget definition that the portal wraps
//! in a generated portlet. The registration is the persisted half of that
//! pairing; the materialized portlet lives in [`crate::domain::portlet`].
//!
//! # Architecture
//!
//! - **Layer:** Domain
//! - **Purpose:** Registration record, identifiers and category list

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary key of a gadget registration (allocated by the repository)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GadgetId(pub i64);

impl std::fmt::Display for GadgetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable external identifier of a gadget, shared by every cluster node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalId(pub Uuid);

impl ExternalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ExternalId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant (isolation boundary) owning a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Tenant used by single-tenant deployments
    pub fn default_tenant() -> Self {
        Self(Uuid::from_u128(1))
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::default_tenant()
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Portlet categories a gadget is deployed into.
///
/// Persisted as a comma-delimited list. Parsing trims whitespace, drops empty
/// entries and removes duplicates while keeping the first occurrence order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortletCategories(Vec<String>);

impl PortletCategories {
    pub const DELIMITER: char = ',';

    pub fn parse(delimited: &str) -> Self {
        Self::from_names(delimited.split(Self::DELIMITER))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || categories.iter().any(|c| c == name) {
                continue;
            }
            categories.push(name.to_string());
        }
        Self(categories)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn to_delimited(&self) -> String {
        self.0.join(",")
    }
}

impl std::fmt::Display for PortletCategories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_delimited())
    }
}

/// Persisted gadget registration.
///
/// `(tenant_id, url)` is unique across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GadgetRegistration {
    pub id: GadgetId,
    pub external_id: ExternalId,
    pub tenant_id: TenantId,
    pub url: String,
    pub display_name: String,
    pub categories: PortletCategories,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl GadgetRegistration {
    pub fn new(
        id: GadgetId,
        external_id: ExternalId,
        tenant_id: TenantId,
        url: impl Into<String>,
        display_name: impl Into<String>,
        categories: PortletCategories,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            external_id,
            tenant_id,
            url: url.into(),
            display_name: display_name.into(),
            categories,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn update_categories(&mut self, categories: PortletCategories) {
        self.categories = categories;
        self.modified_at = Utc::now();
    }
}

/// Caller context for lifecycle operations
#[derive(Debug, Clone, Default)]
pub struct Actor {
    /// User performing the call (audit only)
    pub user_id: String,
    /// Caller-chosen external identifier; a fresh one is generated when absent
    pub external_id: Option<ExternalId>,
    pub add_group_permissions: bool,
    pub add_guest_permissions: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_external_id(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn with_group_permissions(mut self, enabled: bool) -> Self {
        self.add_group_permissions = enabled;
        self
    }

    pub fn with_guest_permissions(mut self, enabled: bool) -> Self {
        self.add_guest_permissions = enabled;
        self
    }
}
