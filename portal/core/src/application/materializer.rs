// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Portlet Materializer
//!
//! Turns a gadget identity into a container-invokable portlet and back.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Build, register, deploy and deprovision gadget portlets
//! - **Collaborators:**
//!   - Domain: `PortletId` derivation, `PortletDefinitionBuilder`
//!   - Application: `InstanceCache`
//!   - Infrastructure: any `PortletContainer`
//!
//! # Flow (materialize)
//!
//! 1. Cache hit returns immediately
//! 2. Derive the local portlet id
//! 3. Clone the template definition from the container
//! 4. Build the immutable definition (identity, class, modes, window states, info)
//! 5. Register the definition and a fresh-handler bag with the container
//! 6. Publish the definition in the cache
//!
//! Steps 2-6 run at most once per key even under concurrent callers. A
//! failure anywhere in them is a `SystemFailure` and leaves nothing cached.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::instance_cache::InstanceCache;
use crate::domain::container::PortletContainer;
use crate::domain::errors::{GadgetError, GadgetResult};
use crate::domain::gadget::{ExternalId, PortletCategories, TenantId};
use crate::domain::portal_config::GadgetConfig;
use crate::domain::portlet::{
    GadgetPortletHandler, MaterializedPortletDefinition, PortletBag, PortletId,
};

pub struct PortletMaterializer {
    cache: Arc<InstanceCache>,
    container: Arc<dyn PortletContainer>,
    template_id: PortletId,
    invoker_portlet_name: String,
}

impl PortletMaterializer {
    pub fn new(
        cache: Arc<InstanceCache>,
        container: Arc<dyn PortletContainer>,
        template_id: PortletId,
        invoker_portlet_name: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            container,
            template_id,
            invoker_portlet_name: invoker_portlet_name.into(),
        }
    }

    pub fn from_config(
        cache: Arc<InstanceCache>,
        container: Arc<dyn PortletContainer>,
        config: &GadgetConfig,
    ) -> Self {
        Self::new(
            cache,
            container,
            config.template_id(),
            config.invoker_portlet_name.clone(),
        )
    }

    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    /// Materialize the portlet for a gadget, reusing the cached definition
    pub async fn materialize(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
        display_name: &str,
    ) -> GadgetResult<Arc<MaterializedPortletDefinition>> {
        let lookup = self
            .cache
            .get_or_try_init(external_id, || {
                self.build_and_register(external_id, tenant_id, display_name)
            })
            .await?;

        if lookup.initialized {
            metrics::counter!("gadget_portal_materializations_total").increment(1);
            info!(
                portlet_id = %lookup.definition.portlet_id(),
                %external_id,
                %tenant_id,
                "Materialized gadget portlet"
            );
        } else {
            metrics::counter!("gadget_portal_cache_hits_total").increment(1);
            debug!(%external_id, "Gadget portlet already materialized");
        }

        Ok(lookup.definition)
    }

    /// Materialize and deploy into the given categories
    pub async fn provision(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
        display_name: &str,
        categories: &PortletCategories,
    ) -> GadgetResult<Arc<MaterializedPortletDefinition>> {
        let definition = self.materialize(external_id, tenant_id, display_name).await?;
        self.container
            .deploy(definition.portlet_id(), categories)
            .await?;
        debug!(
            portlet_id = %definition.portlet_id(),
            categories = %categories,
            "Deployed gadget portlet"
        );
        Ok(definition)
    }

    /// Evict and deregister the portlet; an absent instance is not an error.
    ///
    /// A materialization still in flight for the key is awaited first, so its
    /// container registration is torn down too. A portlet cached for another
    /// tenant is left alone. Returns `true` if anything was actually removed.
    pub async fn deprovision(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
    ) -> GadgetResult<bool> {
        if let Some(cached) = self.cache.settle(&external_id).await {
            if cached.tenant_id() != tenant_id {
                warn!(
                    portlet_id = %cached.portlet_id(),
                    %external_id,
                    owner = %cached.tenant_id(),
                    %tenant_id,
                    "Gadget portlet belongs to another tenant, not deprovisioning"
                );
                return Ok(false);
            }
        }

        let evicted = self
            .cache
            .evict_if(&external_id, |definition| definition.tenant_id() == tenant_id);
        let portlet_id = evicted
            .as_ref()
            .map(|definition| definition.portlet_id().clone())
            .unwrap_or_else(|| PortletId::for_external_id(&external_id));

        let deregistered = self
            .container
            .deregister_instance(tenant_id, &portlet_id)
            .await?;

        if evicted.is_none() && !deregistered {
            warn!(%portlet_id, %external_id, "Gadget portlet already absent, nothing to deprovision");
            return Ok(false);
        }

        metrics::counter!("gadget_portal_deprovisions_total").increment(1);
        info!(%portlet_id, %external_id, "Deprovisioned gadget portlet");
        Ok(true)
    }

    async fn build_and_register(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
        display_name: &str,
    ) -> GadgetResult<Arc<MaterializedPortletDefinition>> {
        let portlet_id = PortletId::for_external_id(&external_id);

        let template = self
            .container
            .clone_template(&self.template_id)
            .await
            .map_err(|e| {
                GadgetError::SystemFailure(format!(
                    "Failed to clone template portlet {}: {}",
                    self.template_id, e
                ))
            })?;

        let definition = Arc::new(
            MaterializedPortletDefinition::builder(template)
                .portlet_id(portlet_id.clone())
                .external_id(external_id)
                .tenant(tenant_id)
                .display_name(display_name)
                .invoker_portlet_name(self.invoker_portlet_name.clone())
                .build()?,
        );

        let bag = PortletBag::new(portlet_id, GadgetPortletHandler::factory(&definition));
        self.container
            .register_instance(definition.clone(), bag)
            .await?;

        Ok(definition)
    }
}
