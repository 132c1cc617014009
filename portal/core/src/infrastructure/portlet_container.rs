// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-Process Portlet Container Registry
//!
//! Reference implementation of the [`PortletContainer`] port. It keeps
//! templates, registered instances with their execution bags, and category
//! deployments in memory. Registration is keyed by portlet id and replaces
//! any earlier registration, so a portlet never has two live entries.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::domain::container::{ContainerError, PortletContainer};
use crate::domain::gadget::{PortletCategories, TenantId};
use crate::domain::portlet::{
    MaterializedPortletDefinition, PortletBag, PortletHandler, PortletId, PortletTemplate,
};

struct RegisteredInstance {
    definition: Arc<MaterializedPortletDefinition>,
    bag: PortletBag,
    categories: Option<PortletCategories>,
}

#[derive(Default)]
pub struct InMemoryPortletContainer {
    templates: DashMap<PortletId, PortletTemplate>,
    instances: DashMap<PortletId, RegisteredInstance>,
    template_clones: AtomicUsize,
}

impl InMemoryPortletContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container seeded with a single template owned by `portlet_app`
    pub fn with_template(template_id: PortletId, portlet_app: impl Into<String>) -> Self {
        let container = Self::new();
        container.add_template(PortletTemplate::new(template_id, portlet_app));
        container
    }

    pub fn add_template(&self, template: PortletTemplate) {
        self.templates.insert(template.template_id.clone(), template);
    }

    /// How many times a template has been cloned
    pub fn template_clone_count(&self) -> usize {
        self.template_clones.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self, portlet_id: &PortletId) -> bool {
        self.instances.contains_key(portlet_id)
    }

    pub fn registered_count(&self) -> usize {
        self.instances.len()
    }

    pub fn definition(&self, portlet_id: &PortletId) -> Option<Arc<MaterializedPortletDefinition>> {
        self.instances
            .get(portlet_id)
            .map(|instance| instance.definition.clone())
    }

    pub fn deployed_categories(&self, portlet_id: &PortletId) -> Option<PortletCategories> {
        self.instances
            .get(portlet_id)
            .and_then(|instance| instance.categories.clone())
    }

    /// Resolve a fresh handler for one invocation of the portlet
    pub fn invoke(&self, portlet_id: &PortletId) -> Option<Box<dyn PortletHandler>> {
        self.instances
            .get(portlet_id)
            .map(|instance| instance.bag.instantiate())
    }
}

#[async_trait]
impl PortletContainer for InMemoryPortletContainer {
    async fn clone_template(&self, template_id: &PortletId) -> Result<PortletTemplate, ContainerError> {
        let template = self
            .templates
            .get(template_id)
            .map(|template| template.clone())
            .ok_or_else(|| ContainerError::TemplateNotFound(template_id.to_string()))?;
        self.template_clones.fetch_add(1, Ordering::SeqCst);
        Ok(template)
    }

    async fn register_instance(
        &self,
        definition: Arc<MaterializedPortletDefinition>,
        bag: PortletBag,
    ) -> Result<(), ContainerError> {
        let portlet_id = definition.portlet_id().clone();
        if bag.portlet_name != portlet_id {
            return Err(ContainerError::Internal(format!(
                "bag {} does not belong to portlet {}",
                bag.portlet_name, portlet_id
            )));
        }

        let previous = self.instances.insert(
            portlet_id.clone(),
            RegisteredInstance {
                definition,
                bag,
                categories: None,
            },
        );
        debug!(%portlet_id, replaced = previous.is_some(), "Registered portlet instance");
        Ok(())
    }

    async fn deploy(
        &self,
        portlet_id: &PortletId,
        categories: &PortletCategories,
    ) -> Result<(), ContainerError> {
        let mut instance = self
            .instances
            .get_mut(portlet_id)
            .ok_or_else(|| ContainerError::NotRegistered(portlet_id.to_string()))?;
        instance.categories = Some(categories.clone());
        Ok(())
    }

    async fn deregister_instance(
        &self,
        tenant_id: TenantId,
        portlet_id: &PortletId,
    ) -> Result<bool, ContainerError> {
        let removed = self
            .instances
            .remove_if(portlet_id, |_, instance| instance.definition.tenant_id() == tenant_id);
        Ok(removed.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gadget::ExternalId;
    use crate::domain::portlet::GadgetPortletHandler;

    fn definition(template: PortletTemplate, tenant: TenantId) -> Arc<MaterializedPortletDefinition> {
        let external_id = ExternalId::new();
        Arc::new(
            MaterializedPortletDefinition::builder(template)
                .portlet_id(PortletId::for_external_id(&external_id))
                .external_id(external_id)
                .tenant(tenant)
                .display_name("Clock")
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_register_replaces_and_deregister_respects_tenant() {
        let template_id = PortletId::from_container("2_WAR_opensocialportlet");
        let container = InMemoryPortletContainer::with_template(template_id.clone(), "opensocial-portlet");
        let tenant = TenantId::new();

        let template = container.clone_template(&template_id).await.unwrap();
        let definition = definition(template, tenant);
        let portlet_id = definition.portlet_id().clone();
        let bag = PortletBag::new(portlet_id.clone(), GadgetPortletHandler::factory(&definition));

        container.register_instance(definition.clone(), bag.clone()).await.unwrap();
        container.register_instance(definition.clone(), bag).await.unwrap();
        assert_eq!(container.registered_count(), 1);

        assert!(!container.deregister_instance(TenantId::new(), &portlet_id).await.unwrap());
        assert!(container.deregister_instance(tenant, &portlet_id).await.unwrap());
        assert!(!container.deregister_instance(tenant, &portlet_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_deploy_requires_registration() {
        let container = InMemoryPortletContainer::new();
        let err = container
            .deploy(&PortletId::from_container("missing"), &PortletCategories::parse("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContainerError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let container = InMemoryPortletContainer::new();
        let err = container
            .clone_template(&PortletId::from_container("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, ContainerError::TemplateNotFound(_)));
        assert_eq!(container.template_clone_count(), 0);
    }
}
