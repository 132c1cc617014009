// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Portlet Container Port
//!
//! The portlet container is an external collaborator. The core only needs
//! template lookup, instance registration, category deployment and
//! deregistration, all keyed by the deterministic local [`PortletId`].

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::gadget::{PortletCategories, TenantId};
use crate::domain::portlet::{MaterializedPortletDefinition, PortletBag, PortletId, PortletTemplate};

#[async_trait]
pub trait PortletContainer: Send + Sync {
    /// Return a private copy of the template definition for `template_id`
    async fn clone_template(&self, template_id: &PortletId) -> Result<PortletTemplate, ContainerError>;

    /// Register (or replace) the instance and its backing execution bag
    async fn register_instance(
        &self,
        definition: Arc<MaterializedPortletDefinition>,
        bag: PortletBag,
    ) -> Result<(), ContainerError>;

    /// Deploy a registered instance into categories, replacing earlier ones
    async fn deploy(
        &self,
        portlet_id: &PortletId,
        categories: &PortletCategories,
    ) -> Result<(), ContainerError>;

    /// Remove the instance; returns `false` if it was not registered
    async fn deregister_instance(
        &self,
        tenant_id: TenantId,
        portlet_id: &PortletId,
    ) -> Result<bool, ContainerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Template portlet not found: {0}")]
    TemplateNotFound(String),

    #[error("Portlet instance not registered: {0}")]
    NotRegistered(String),

    #[error("Container failure: {0}")]
    Internal(String),
}
