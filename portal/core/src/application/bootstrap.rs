// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Portal Bootstrap
//!
//! Wires one gadget portal node from its configuration: repository, portlet
//! container (seeded with the gadget template), access-control and
//! credential facades, event bus, materializer, lifecycle service and the
//! cluster listener.
//!
//! Starting a node spawns the listener and then runs `materialize_all` so
//! registrations persisted before the restart are served again.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::cluster::ClusterEventListener;
use crate::application::gadget_lifecycle::{
    BulkReport, GadgetLifecycleService, LifecycleSettings, StandardGadgetLifecycleService,
};
use crate::application::instance_cache::InstanceCache;
use crate::application::materializer::PortletMaterializer;
use crate::application::repository_factory::create_gadget_repository;
use crate::domain::definition::GadgetDefinitionFetcher;
use crate::domain::errors::GadgetResult;
use crate::domain::events::NodeId;
use crate::domain::portal_config::PortalConfigManifest;
use crate::domain::repository::GadgetRepository;
use crate::infrastructure::access::{
    InMemoryCredentialGrantService, InMemoryResourcePermissionService,
};
use crate::infrastructure::definition_fetcher::HttpGadgetDefinitionFetcher;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::portlet_container::InMemoryPortletContainer;

pub struct GadgetPortal {
    config: PortalConfigManifest,
    lifecycle: Arc<dyn GadgetLifecycleService>,
    materializer: Arc<PortletMaterializer>,
    container: Arc<InMemoryPortletContainer>,
    permissions: Arc<InMemoryResourcePermissionService>,
    credentials: Arc<InMemoryCredentialGrantService>,
    event_bus: EventBus,
    listener: Option<JoinHandle<()>>,
}

impl GadgetPortal {
    /// Build and start a node with its own event bus
    pub async fn bootstrap(config: PortalConfigManifest) -> Result<Self> {
        // broadcast channels panic on zero capacity, so validate first
        config.validate().context("Invalid portal configuration")?;
        let event_bus = EventBus::new(config.spec.cluster.event_capacity);
        Self::bootstrap_on(config, event_bus).await
    }

    /// Build and start a node attached to an existing event bus
    pub async fn bootstrap_on(config: PortalConfigManifest, event_bus: EventBus) -> Result<Self> {
        config.validate().context("Invalid portal configuration")?;

        let repository = create_gadget_repository(&config.storage_backend())
            .await
            .context("Failed to initialize gadget repository")?;
        let fetcher = Arc::new(
            HttpGadgetDefinitionFetcher::new(config.spec.gadgets.fetch_timeout())
                .context("Failed to build gadget definition fetcher")?,
        );

        let mut portal = Self::assemble(config, repository, fetcher, event_bus);
        let report = portal
            .start()
            .await
            .context("Failed to reconcile persisted gadgets")?;
        if !report.is_clean() {
            warn!(failures = report.failures, "Some gadgets could not be materialized at startup");
        }
        Ok(portal)
    }

    /// Wire a node from already constructed collaborators without starting it
    pub fn assemble(
        config: PortalConfigManifest,
        repository: Arc<dyn GadgetRepository>,
        fetcher: Arc<dyn GadgetDefinitionFetcher>,
        event_bus: EventBus,
    ) -> Self {
        let gadgets = &config.spec.gadgets;
        let container = Arc::new(InMemoryPortletContainer::with_template(
            gadgets.template_id(),
            gadgets.portlet_app.clone(),
        ));
        let permissions = Arc::new(InMemoryResourcePermissionService::new());
        let credentials = Arc::new(InMemoryCredentialGrantService::new());
        let materializer = Arc::new(PortletMaterializer::from_config(
            Arc::new(InstanceCache::new()),
            container.clone(),
            gadgets,
        ));

        let lifecycle = Arc::new(StandardGadgetLifecycleService::new(
            repository,
            fetcher,
            permissions.clone(),
            credentials.clone(),
            materializer.clone(),
            Arc::new(event_bus.clone()),
            LifecycleSettings::from_config(&config),
        ));

        Self {
            config,
            lifecycle,
            materializer,
            container,
            permissions,
            credentials,
            event_bus,
            listener: None,
        }
    }

    /// Spawn the cluster listener and reconcile persisted registrations
    pub async fn start(&mut self) -> GadgetResult<BulkReport> {
        if self.listener.is_none() {
            let listener = Arc::new(ClusterEventListener::new(
                self.node_id(),
                self.materializer.clone(),
            ));
            self.listener = Some(listener.spawn(self.event_bus.subscribe_cluster()));
        }

        let report = self.lifecycle.materialize_all().await?;
        info!(
            node = %self.node_id(),
            materialized = report.succeeded(),
            failures = report.failures,
            "Gadget portal node started"
        );
        Ok(report)
    }

    /// Tear down local portlets and stop the listener; records are kept
    pub async fn shutdown(mut self) -> GadgetResult<BulkReport> {
        let report = self.lifecycle.deprovision_all().await?;
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        info!(node = %self.node_id(), "Gadget portal node stopped");
        Ok(report)
    }

    pub fn lifecycle(&self) -> Arc<dyn GadgetLifecycleService> {
        self.lifecycle.clone()
    }

    pub fn materializer(&self) -> &PortletMaterializer {
        &self.materializer
    }

    pub fn container(&self) -> &InMemoryPortletContainer {
        &self.container
    }

    pub fn permissions(&self) -> &InMemoryResourcePermissionService {
        &self.permissions
    }

    pub fn credentials(&self) -> &InMemoryCredentialGrantService {
        &self.credentials
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &PortalConfigManifest {
        &self.config
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id()
    }
}

impl Drop for GadgetPortal {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
