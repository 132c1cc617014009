// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Gadget Lifecycle Use Cases
//!
//! Application service owning the registration lifecycle:
//! `Unregistered -> Registered -> Materialized -> Deregistered`.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Validate, persist, grant, materialize and tear down
//!   gadget registrations
//! - **Collaborators:**
//!   - Domain: `GadgetRepository`, `GadgetDefinitionFetcher`,
//!     `ResourcePermissionService`, `CredentialGrantService`,
//!     `GadgetEventPublisher`
//!   - Application: `PortletMaterializer`
//!
//! # Flow (register)
//!
//! 1. Reject a blank or whitespace-padded URL, a duplicate `(tenant, url)`
//!    and an empty category list
//! 2. Fetch the remote definition (bounded by the configured timeout)
//! 3. Allocate an id and persist the registration
//! 4. Grant baseline access-control entries
//! 5. Materialize and deploy locally, then broadcast to peers
//!
//! Validation failures happen before any side effect. Steps 3-5 are not
//! rolled back: a materialization failure after step 3 leaves the record
//! registered and returns `SystemFailure`; `materialize_all` heals it.
//!
//! # Bulk operations
//!
//! `deregister_all`, `materialize_all` and `deprovision_all` log each failing
//! record, keep going, and return a [`BulkReport`].

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::application::materializer::PortletMaterializer;
use crate::domain::access::{
    published_gadget_key, BaselineGrants, CredentialGrantService, ResourcePermissionService,
    ResourceRef,
};
use crate::domain::definition::GadgetDefinitionFetcher;
use crate::domain::errors::{GadgetError, GadgetResult};
use crate::domain::events::{
    GadgetClusterEvent, GadgetEventPublisher, GadgetLifecycleEvent, NodeId,
};
use crate::domain::gadget::{
    Actor, ExternalId, GadgetId, GadgetRegistration, PortletCategories, TenantId,
};
use crate::domain::portal_config::PortalConfigManifest;
use crate::domain::portlet::MaterializedPortletDefinition;
use crate::domain::repository::{GadgetRepository, RepositoryError};

/// Aggregate outcome of a bulk lifecycle operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkReport {
    pub operation: &'static str,
    pub processed: usize,
    pub failures: usize,
    pub errors: Vec<BulkFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub gadget_id: GadgetId,
    pub message: String,
}

impl BulkReport {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            ..Default::default()
        }
    }

    fn record<T>(&mut self, gadget_id: GadgetId, result: GadgetResult<T>) {
        self.processed += 1;
        if let Err(e) = result {
            warn!(operation = self.operation, %gadget_id, error = %e, "Bulk gadget operation failed for record");
            metrics::counter!("gadget_portal_bulk_failures_total", "operation" => self.operation)
                .increment(1);
            self.failures += 1;
            self.errors.push(BulkFailure {
                gadget_id,
                message: e.to_string(),
            });
        }
    }

    pub fn succeeded(&self) -> usize {
        self.processed - self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}

/// Node-level settings the lifecycle service needs
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub node_id: NodeId,
    pub fetch_timeout: Duration,
    pub credential_key_prefix: String,
}

impl LifecycleSettings {
    pub fn from_config(config: &PortalConfigManifest) -> Self {
        Self {
            node_id: config.node_id(),
            fetch_timeout: config.spec.gadgets.fetch_timeout(),
            credential_key_prefix: config.spec.gadgets.credential_key_prefix.clone(),
        }
    }
}

#[async_trait]
pub trait GadgetLifecycleService: Send + Sync {
    /// Register a gadget hosted at `url` for `tenant_id`
    ///
    /// # Errors
    ///
    /// - `InvalidSourceDefinition`: blank or whitespace-padded URL, or the definition could not be
    ///   fetched, parsed, or arrived after the timeout
    /// - `DuplicateRegistration`: `(tenant_id, url)` is already registered
    /// - `CategoryRequired`: `categories` is empty
    /// - `SystemFailure`: persistence, grants or materialization failed
    async fn register(
        &self,
        tenant_id: TenantId,
        url: &str,
        categories: PortletCategories,
        actor: &Actor,
    ) -> GadgetResult<GadgetRegistration>;

    /// Replace a registration's categories and redeploy it
    async fn update(
        &self,
        id: GadgetId,
        categories: PortletCategories,
        actor: &Actor,
    ) -> GadgetResult<GadgetRegistration>;

    /// Deregister by id; `NotFound` when no such registration exists
    async fn deregister(&self, id: GadgetId) -> GadgetResult<GadgetRegistration>;

    /// Deregister an already loaded registration
    async fn deregister_registration(
        &self,
        registration: GadgetRegistration,
    ) -> GadgetResult<GadgetRegistration>;

    /// Deregister every registration of a tenant
    async fn deregister_all(&self, tenant_id: TenantId) -> GadgetResult<BulkReport>;

    /// Materialize and deploy every persisted registration on this node
    async fn materialize_all(&self) -> GadgetResult<BulkReport>;

    /// Tear down every materialized portlet on this node, keeping the records
    async fn deprovision_all(&self) -> GadgetResult<BulkReport>;

    /// Materialize and deploy one registration here and on every peer
    async fn init_gadget(
        &self,
        registration: &GadgetRegistration,
    ) -> GadgetResult<Arc<MaterializedPortletDefinition>>;

    /// Deprovision one gadget here and on every peer
    async fn destroy_gadget(&self, external_id: ExternalId, tenant_id: TenantId) -> GadgetResult<bool>;

    async fn get(&self, id: GadgetId) -> GadgetResult<GadgetRegistration>;

    async fn fetch_by_url(
        &self,
        tenant_id: TenantId,
        url: &str,
    ) -> GadgetResult<Option<GadgetRegistration>>;

    async fn get_by_url(&self, tenant_id: TenantId, url: &str) -> GadgetResult<GadgetRegistration>;

    async fn get_by_external_id(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
    ) -> GadgetResult<GadgetRegistration>;

    /// Page through a tenant's registrations ordered by id
    async fn list(
        &self,
        tenant_id: TenantId,
        offset: usize,
        limit: usize,
    ) -> GadgetResult<Vec<GadgetRegistration>>;

    async fn count(&self, tenant_id: TenantId) -> GadgetResult<usize>;
}

pub struct StandardGadgetLifecycleService {
    repository: Arc<dyn GadgetRepository>,
    fetcher: Arc<dyn GadgetDefinitionFetcher>,
    permissions: Arc<dyn ResourcePermissionService>,
    credentials: Arc<dyn CredentialGrantService>,
    materializer: Arc<PortletMaterializer>,
    publisher: Arc<dyn GadgetEventPublisher>,
    settings: LifecycleSettings,
}

impl StandardGadgetLifecycleService {
    pub fn new(
        repository: Arc<dyn GadgetRepository>,
        fetcher: Arc<dyn GadgetDefinitionFetcher>,
        permissions: Arc<dyn ResourcePermissionService>,
        credentials: Arc<dyn CredentialGrantService>,
        materializer: Arc<PortletMaterializer>,
        publisher: Arc<dyn GadgetEventPublisher>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            repository,
            fetcher,
            permissions,
            credentials,
            materializer,
            publisher,
            settings,
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.settings.node_id
    }

    async fn fetch_display_name(&self, url: &str) -> GadgetResult<String> {
        let invalid = |reason: String| GadgetError::InvalidSourceDefinition {
            url: url.to_string(),
            reason,
        };

        let fetched = tokio::time::timeout(self.settings.fetch_timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| {
                invalid(format!(
                    "timed out after {} ms",
                    self.settings.fetch_timeout.as_millis()
                ))
            })?;

        let definition = fetched.map_err(|e| invalid(e.to_string()))?;
        Ok(definition.display_name(url))
    }

    /// Materialize and deploy on this node only
    async fn provision_local(
        &self,
        registration: &GadgetRegistration,
    ) -> GadgetResult<Arc<MaterializedPortletDefinition>> {
        self.materializer
            .provision(
                registration.external_id,
                registration.tenant_id,
                &registration.display_name,
                &registration.categories,
            )
            .await
    }

    fn broadcast_materialize(&self, registration: &GadgetRegistration) {
        self.publisher.broadcast(GadgetClusterEvent::Materialize {
            origin: self.settings.node_id.clone(),
            gadget_id: registration.id,
            external_id: registration.external_id,
            tenant_id: registration.tenant_id,
            display_name: registration.display_name.clone(),
            categories: registration.categories.clone(),
            emitted_at: Utc::now(),
        });
    }

    fn broadcast_invalidate(&self, external_id: ExternalId, tenant_id: TenantId) {
        self.publisher.broadcast(GadgetClusterEvent::Invalidate {
            origin: self.settings.node_id.clone(),
            external_id,
            tenant_id,
            emitted_at: Utc::now(),
        });
    }

    async fn all_for_tenant(&self, tenant_id: TenantId) -> GadgetResult<Vec<GadgetRegistration>> {
        let total = self.repository.count_by_tenant(tenant_id).await?;
        Ok(self.repository.find_by_tenant(tenant_id, 0, total).await?)
    }
}

#[async_trait]
impl GadgetLifecycleService for StandardGadgetLifecycleService {
    async fn register(
        &self,
        tenant_id: TenantId,
        url: &str,
        categories: PortletCategories,
        actor: &Actor,
    ) -> GadgetResult<GadgetRegistration> {
        if url.trim().is_empty() {
            return Err(GadgetError::InvalidSourceDefinition {
                url: url.to_string(),
                reason: "URL is empty".to_string(),
            });
        }
        // Stored and looked up verbatim, so padding would make it unreachable
        if url.trim() != url {
            return Err(GadgetError::InvalidSourceDefinition {
                url: url.to_string(),
                reason: "URL has leading or trailing whitespace".to_string(),
            });
        }

        if self
            .repository
            .find_by_tenant_and_url(tenant_id, url)
            .await?
            .is_some()
        {
            return Err(GadgetError::DuplicateRegistration {
                tenant_id,
                url: url.to_string(),
            });
        }

        if categories.is_empty() {
            return Err(GadgetError::CategoryRequired);
        }

        let display_name = self.fetch_display_name(url).await?;

        let id = self.repository.next_id().await?;
        let registration = GadgetRegistration::new(
            id,
            actor.external_id.unwrap_or_default(),
            tenant_id,
            url,
            display_name,
            categories,
        );

        self.repository
            .insert(&registration)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => GadgetError::DuplicateRegistration {
                    tenant_id,
                    url: url.to_string(),
                },
                other => other.into(),
            })?;

        self.permissions
            .add_resources(
                &ResourceRef::gadget(tenant_id, id),
                BaselineGrants {
                    group: actor.add_group_permissions,
                    guest: actor.add_guest_permissions,
                },
            )
            .await?;

        info!(
            gadget_id = %id,
            %tenant_id,
            url,
            user = %actor.user_id,
            "Registered gadget"
        );
        self.publisher
            .publish_lifecycle(GadgetLifecycleEvent::GadgetRegistered {
                gadget_id: id,
                tenant_id,
                url: url.to_string(),
                registered_at: registration.created_at,
            });

        if let Err(e) = self.init_gadget(&registration).await {
            error!(gadget_id = %id, error = %e, "Gadget registered but not materialized");
            return Err(GadgetError::SystemFailure(format!(
                "gadget {} registered but not materialized: {}",
                id, e
            )));
        }

        Ok(registration)
    }

    async fn update(
        &self,
        id: GadgetId,
        categories: PortletCategories,
        actor: &Actor,
    ) -> GadgetResult<GadgetRegistration> {
        if categories.is_empty() {
            return Err(GadgetError::CategoryRequired);
        }

        let mut registration = self.get(id).await?;
        registration.update_categories(categories);
        self.repository.update(&registration).await?;

        self.init_gadget(&registration).await?;

        info!(
            gadget_id = %id,
            categories = %registration.categories,
            user = %actor.user_id,
            "Updated gadget categories"
        );
        self.publisher
            .publish_lifecycle(GadgetLifecycleEvent::GadgetUpdated {
                gadget_id: id,
                categories: registration.categories.clone(),
                updated_at: registration.modified_at,
            });

        Ok(registration)
    }

    async fn deregister(&self, id: GadgetId) -> GadgetResult<GadgetRegistration> {
        let registration = self.get(id).await?;
        self.deregister_registration(registration).await
    }

    async fn deregister_registration(
        &self,
        registration: GadgetRegistration,
    ) -> GadgetResult<GadgetRegistration> {
        let id = registration.id;
        let tenant_id = registration.tenant_id;

        self.destroy_gadget(registration.external_id, tenant_id).await?;

        self.repository.delete(id).await?;

        self.permissions
            .delete_resource(&ResourceRef::gadget(tenant_id, id))
            .await?;

        let key = published_gadget_key(&self.settings.credential_key_prefix, id);
        let revoked_credentials = self.credentials.revoke_all(&key).await?;

        info!(gadget_id = %id, %tenant_id, revoked_credentials, "Deregistered gadget");
        self.publisher
            .publish_lifecycle(GadgetLifecycleEvent::GadgetDeregistered {
                gadget_id: id,
                tenant_id,
                revoked_credentials,
                deregistered_at: Utc::now(),
            });

        Ok(registration)
    }

    async fn deregister_all(&self, tenant_id: TenantId) -> GadgetResult<BulkReport> {
        let mut report = BulkReport::new("deregister_all");
        for registration in self.all_for_tenant(tenant_id).await? {
            let id = registration.id;
            let result = self.deregister_registration(registration).await;
            report.record(id, result);
        }

        info!(%tenant_id, processed = report.processed, failures = report.failures, "Deregistered tenant gadgets");
        Ok(report)
    }

    async fn materialize_all(&self) -> GadgetResult<BulkReport> {
        let mut report = BulkReport::new("materialize_all");
        for registration in self.repository.list_all().await? {
            let result = self.provision_local(&registration).await;
            report.record(registration.id, result);
        }

        info!(processed = report.processed, failures = report.failures, "Materialized persisted gadgets");
        Ok(report)
    }

    async fn deprovision_all(&self) -> GadgetResult<BulkReport> {
        let mut report = BulkReport::new("deprovision_all");
        for registration in self.repository.list_all().await? {
            let result = self
                .materializer
                .deprovision(registration.external_id, registration.tenant_id)
                .await;
            report.record(registration.id, result);
        }

        info!(processed = report.processed, failures = report.failures, "Deprovisioned local gadget portlets");
        Ok(report)
    }

    async fn init_gadget(
        &self,
        registration: &GadgetRegistration,
    ) -> GadgetResult<Arc<MaterializedPortletDefinition>> {
        let definition = self.provision_local(registration).await?;
        self.broadcast_materialize(registration);
        Ok(definition)
    }

    async fn destroy_gadget(&self, external_id: ExternalId, tenant_id: TenantId) -> GadgetResult<bool> {
        let removed = self.materializer.deprovision(external_id, tenant_id).await?;
        self.broadcast_invalidate(external_id, tenant_id);
        Ok(removed)
    }

    async fn get(&self, id: GadgetId) -> GadgetResult<GadgetRegistration> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| GadgetError::NotFound(format!("No gadget exists with id {}", id)))
    }

    async fn fetch_by_url(
        &self,
        tenant_id: TenantId,
        url: &str,
    ) -> GadgetResult<Option<GadgetRegistration>> {
        Ok(self.repository.find_by_tenant_and_url(tenant_id, url).await?)
    }

    async fn get_by_url(&self, tenant_id: TenantId, url: &str) -> GadgetResult<GadgetRegistration> {
        self.fetch_by_url(tenant_id, url).await?.ok_or_else(|| {
            GadgetError::NotFound(format!("No gadget exists for tenant {} at {}", tenant_id, url))
        })
    }

    async fn get_by_external_id(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
    ) -> GadgetResult<GadgetRegistration> {
        self.repository
            .find_by_external_id(external_id, tenant_id)
            .await?
            .ok_or_else(|| {
                GadgetError::NotFound(format!("No gadget exists with external id {}", external_id))
            })
    }

    async fn list(
        &self,
        tenant_id: TenantId,
        offset: usize,
        limit: usize,
    ) -> GadgetResult<Vec<GadgetRegistration>> {
        Ok(self.repository.find_by_tenant(tenant_id, offset, limit).await?)
    }

    async fn count(&self, tenant_id: TenantId) -> GadgetResult<usize> {
        Ok(self.repository.count_by_tenant(tenant_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::instance_cache::InstanceCache;
    use crate::domain::definition::{FetchError, GadgetDefinition};
    use crate::domain::portal_config::GadgetConfig;
    use crate::infrastructure::access::{
        InMemoryCredentialGrantService, InMemoryResourcePermissionService,
    };
    use crate::infrastructure::event_bus::{DomainEvent, EventBus};
    use crate::infrastructure::portlet_container::InMemoryPortletContainer;
    use crate::infrastructure::repositories::InMemoryGadgetRepository;

    struct StaticFetcher;

    #[async_trait]
    impl GadgetDefinitionFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<GadgetDefinition, FetchError> {
            if url.contains("unreachable") {
                return Err(FetchError::Unreachable(url.to_string()));
            }
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(GadgetDefinition {
                title: "Clock".to_string(),
                description: None,
                author: None,
            })
        }
    }

    struct Fixture {
        service: StandardGadgetLifecycleService,
        repository: Arc<InMemoryGadgetRepository>,
        container: Arc<InMemoryPortletContainer>,
        permissions: Arc<InMemoryResourcePermissionService>,
        credentials: Arc<InMemoryCredentialGrantService>,
        events: EventBus,
    }

    fn fixture() -> Fixture {
        let config = GadgetConfig::default();
        let repository = Arc::new(InMemoryGadgetRepository::new());
        let container = Arc::new(InMemoryPortletContainer::with_template(
            config.template_id(),
            config.portlet_app.clone(),
        ));
        let permissions = Arc::new(InMemoryResourcePermissionService::new());
        let credentials = Arc::new(InMemoryCredentialGrantService::new());
        let events = EventBus::new(64);
        let materializer = Arc::new(PortletMaterializer::from_config(
            Arc::new(InstanceCache::new()),
            container.clone(),
            &config,
        ));

        let service = StandardGadgetLifecycleService::new(
            repository.clone(),
            Arc::new(StaticFetcher),
            permissions.clone(),
            credentials.clone(),
            materializer,
            Arc::new(events.clone()),
            LifecycleSettings {
                node_id: NodeId("node-a".to_string()),
                fetch_timeout: Duration::from_millis(200),
                credential_key_prefix: config.credential_key_prefix.clone(),
            },
        );

        Fixture {
            service,
            repository,
            container,
            permissions,
            credentials,
            events,
        }
    }

    fn categories() -> PortletCategories {
        PortletCategories::parse("social")
    }

    #[tokio::test]
    async fn test_register_persists_grants_and_materializes() {
        let f = fixture();
        let mut events = f.events.subscribe();
        let tenant = TenantId::default_tenant();
        let actor = Actor::new("admin").with_group_permissions(true);

        let registration = f
            .service
            .register(tenant, "http://example.com/clock.xml", categories(), &actor)
            .await
            .unwrap();

        assert_eq!(registration.display_name, "Clock");
        assert_eq!(f.container.registered_count(), 1);
        assert!(f
            .permissions
            .roles(&ResourceRef::gadget(tenant, registration.id))
            .is_some());

        assert!(matches!(
            events.recv().await.unwrap(),
            DomainEvent::Lifecycle(GadgetLifecycleEvent::GadgetRegistered { .. })
        ));
        match events.recv().await.unwrap() {
            DomainEvent::Cluster(GadgetClusterEvent::Materialize { origin, external_id, .. }) => {
                assert_eq!(origin, NodeId("node-a".to_string()));
                assert_eq!(external_id, registration.external_id);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_uses_caller_external_id() {
        let f = fixture();
        let external_id = ExternalId::new();
        let registration = f
            .service
            .register(
                TenantId::default_tenant(),
                "http://example.com/clock.xml",
                categories(),
                &Actor::new("admin").with_external_id(external_id),
            )
            .await
            .unwrap();
        assert_eq!(registration.external_id, external_id);
    }

    #[tokio::test]
    async fn test_validation_happens_before_side_effects() {
        let f = fixture();
        let tenant = TenantId::default_tenant();
        let actor = Actor::new("admin");

        let err = f
            .service
            .register(tenant, "http://example.com/clock.xml", PortletCategories::default(), &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GadgetError::CategoryRequired));

        let err = f
            .service
            .register(tenant, "   ", categories(), &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GadgetError::InvalidSourceDefinition { .. }));

        let err = f
            .service
            .register(tenant, "http://unreachable.example.com/g.xml", categories(), &actor)
            .await
            .unwrap_err();
        assert!(err.is_validation());

        assert_eq!(f.repository.list_all().await.unwrap().len(), 0);
        assert_eq!(f.permissions.resource_count(), 0);
        assert_eq!(f.container.registered_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_invalid_source() {
        let f = fixture();
        let err = f
            .service
            .register(
                TenantId::default_tenant(),
                "http://slow.example.com/g.xml",
                categories(),
                &Actor::new("admin"),
            )
            .await
            .unwrap_err();

        match err {
            GadgetError::InvalidSourceDefinition { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_materialization_failure_keeps_record() {
        let f = fixture();
        // Remove the template so materialization cannot clone it
        let service = StandardGadgetLifecycleService::new(
            f.repository.clone(),
            Arc::new(StaticFetcher),
            f.permissions.clone(),
            f.credentials.clone(),
            Arc::new(PortletMaterializer::from_config(
                Arc::new(InstanceCache::new()),
                Arc::new(InMemoryPortletContainer::new()),
                &GadgetConfig::default(),
            )),
            Arc::new(f.events.clone()),
            f.service.settings.clone(),
        );

        let err = service
            .register(
                TenantId::default_tenant(),
                "http://example.com/clock.xml",
                categories(),
                &Actor::new("admin"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, GadgetError::SystemFailure(_)));
        assert_eq!(f.repository.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_redeploys_and_rejects_empty() {
        let f = fixture();
        let actor = Actor::new("admin");
        let registration = f
            .service
            .register(TenantId::default_tenant(), "http://example.com/clock.xml", categories(), &actor)
            .await
            .unwrap();

        let err = f
            .service
            .update(registration.id, PortletCategories::parse(" , "), &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GadgetError::CategoryRequired));
        assert_eq!(f.service.get(registration.id).await.unwrap().categories, categories());

        let updated = f
            .service
            .update(registration.id, PortletCategories::parse("news,tools"), &actor)
            .await
            .unwrap();
        let definition = f.service.materializer.cache().get(&registration.external_id).unwrap();
        assert_eq!(
            f.container.deployed_categories(definition.portlet_id()),
            Some(updated.categories.clone())
        );
        assert_eq!(f.container.template_clone_count(), 1);

        let err = f
            .service
            .update(GadgetId(9999), categories(), &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GadgetError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deregister_revokes_everything() {
        let f = fixture();
        let tenant = TenantId::default_tenant();
        let registration = f
            .service
            .register(tenant, "http://example.com/clock.xml", categories(), &Actor::new("admin"))
            .await
            .unwrap();
        let key = published_gadget_key("published_", registration.id);
        f.credentials.issue(key.clone(), "consumer");

        f.service.deregister(registration.id).await.unwrap();

        assert_eq!(f.container.registered_count(), 0);
        assert_eq!(f.permissions.resource_count(), 0);
        assert_eq!(f.credentials.grant_count(&key), 0);
        assert!(f.service.materializer.cache().is_empty());

        let err = f.service.deregister(registration.id).await.unwrap_err();
        assert!(matches!(err, GadgetError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_queries() {
        let f = fixture();
        let tenant = TenantId::new();
        let actor = Actor::new("admin");
        for n in 0..3 {
            f.service
                .register(tenant, &format!("http://example.com/{}.xml", n), categories(), &actor)
                .await
                .unwrap();
        }

        assert_eq!(f.service.count(tenant).await.unwrap(), 3);
        assert_eq!(f.service.list(tenant, 1, 10).await.unwrap().len(), 2);

        let found = f.service.get_by_url(tenant, "http://example.com/1.xml").await.unwrap();
        assert_eq!(
            f.service
                .get_by_external_id(found.external_id, tenant)
                .await
                .unwrap()
                .id,
            found.id
        );

        assert!(f
            .service
            .fetch_by_url(tenant, "http://example.com/none.xml")
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            f.service.get_by_url(tenant, "http://example.com/none.xml").await,
            Err(GadgetError::NotFound(_))
        ));
        assert!(matches!(
            f.service.get_by_external_id(ExternalId::new(), tenant).await,
            Err(GadgetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deprovision_all_then_materialize_all() {
        let f = fixture();
        let tenant = TenantId::default_tenant();
        let actor = Actor::new("admin");
        for n in 0..2 {
            f.service
                .register(tenant, &format!("http://example.com/{}.xml", n), categories(), &actor)
                .await
                .unwrap();
        }

        let report = f.service.deprovision_all().await.unwrap();
        assert_eq!(report.processed, 2);
        assert!(report.is_clean());
        assert_eq!(f.container.registered_count(), 0);
        assert_eq!(f.repository.list_all().await.unwrap().len(), 2);

        let report = f.service.materialize_all().await.unwrap();
        assert_eq!(report.succeeded(), 2);
        assert_eq!(f.container.registered_count(), 2);
    }
}
