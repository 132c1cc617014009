// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end lifecycle tests over the in-memory node wiring.
//!
//! Remote gadget definitions are served by a `mockito` server and fetched
//! through the real HTTP fetcher. Failure injection uses hand-written fakes
//! of the access-control port.

use async_trait::async_trait;
use gadget_portal_core::application::{
    GadgetLifecycleService, GadgetPortal, InstanceCache, LifecycleSettings, PortletMaterializer,
    StandardGadgetLifecycleService,
};
use gadget_portal_core::domain::access::{
    AccessControlError, BaselineGrants, ResourcePermissionService, ResourceRef,
};
use gadget_portal_core::domain::container::{ContainerError, PortletContainer};
use gadget_portal_core::domain::errors::GadgetError;
use gadget_portal_core::domain::gadget::{
    Actor, ExternalId, GadgetId, GadgetRegistration, PortletCategories, TenantId,
};
use gadget_portal_core::domain::portal_config::PortalConfigManifest;
use gadget_portal_core::domain::portlet::{
    MaterializedPortletDefinition, PortletBag, PortletId, PortletTemplate,
};
use gadget_portal_core::domain::repository::GadgetRepository;
use gadget_portal_core::infrastructure::access::InMemoryCredentialGrantService;
use gadget_portal_core::infrastructure::definition_fetcher::HttpGadgetDefinitionFetcher;
use gadget_portal_core::infrastructure::event_bus::EventBus;
use gadget_portal_core::infrastructure::portlet_container::InMemoryPortletContainer;
use gadget_portal_core::infrastructure::repositories::InMemoryGadgetRepository;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const GADGET_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Module>
  <ModulePrefs title="Weather" description="Local forecast"/>
  <Content type="html"><![CDATA[<div></div>]]></Content>
</Module>"#;

async fn gadget_server() -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", mockito::Matcher::Regex(r"^/gadgets/.*\.xml$".to_string()))
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(GADGET_XML)
        .expect_at_least(0)
        .create_async()
        .await;
    server
}

fn node(repository: Arc<InMemoryGadgetRepository>) -> GadgetPortal {
    let config = PortalConfigManifest::default();
    let fetcher = Arc::new(HttpGadgetDefinitionFetcher::new(Duration::from_secs(2)).unwrap());
    GadgetPortal::assemble(config, repository, fetcher, EventBus::new(64))
}

fn social() -> PortletCategories {
    PortletCategories::parse("social")
}

#[tokio::test]
async fn register_then_lookup_by_tenant_and_url() {
    let server = gadget_server().await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let portal = node(repository.clone());
    let lifecycle = portal.lifecycle();
    let tenant = TenantId::new();
    let url = format!("{}/gadgets/weather.xml", server.url());

    let registered = lifecycle
        .register(tenant, &url, social(), &Actor::new("admin").with_guest_permissions(true))
        .await
        .unwrap();

    let found = lifecycle.get_by_url(tenant, &url).await.unwrap();
    assert_eq!(found.url, url);
    assert_eq!(found.tenant_id, tenant);
    assert_eq!(found.id, registered.id);
    assert_eq!(found.display_name, "Weather");

    let portlet_id = PortletId::for_external_id(&registered.external_id);
    assert!(portal.container().is_registered(&portlet_id));
    assert_eq!(portal.container().deployed_categories(&portlet_id), Some(social()));

    let roles = portal
        .permissions()
        .roles(&ResourceRef::gadget(tenant, registered.id))
        .unwrap();
    assert!(roles.contains("guest"));
    assert!(!roles.contains("group"));
}

#[tokio::test]
async fn padded_url_is_rejected_and_stored_urls_match_lookups() {
    let server = gadget_server().await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let portal = node(repository.clone());
    let lifecycle = portal.lifecycle();
    let tenant = TenantId::new();
    let url = format!("{}/gadgets/weather.xml", server.url());
    let actor = Actor::new("admin");

    for padded in [format!("{} ", url), format!(" {}", url), format!("\t{}\n", url)] {
        let err = lifecycle
            .register(tenant, &padded, social(), &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, GadgetError::InvalidSourceDefinition { .. }), "{:?}", padded);
        assert!(lifecycle.fetch_by_url(tenant, &padded).await.unwrap().is_none());
    }
    assert!(repository.list_all().await.unwrap().is_empty());

    let registered = lifecycle.register(tenant, &url, social(), &actor).await.unwrap();
    assert_eq!(registered.url, url);
    assert_eq!(lifecycle.get_by_url(tenant, &registered.url).await.unwrap().id, registered.id);
}

#[tokio::test]
async fn duplicate_registration_keeps_one_record() {
    let server = gadget_server().await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let portal = node(repository.clone());
    let lifecycle = portal.lifecycle();
    let tenant = TenantId::new();
    let url = format!("{}/gadgets/weather.xml", server.url());
    let actor = Actor::new("admin");

    lifecycle.register(tenant, &url, social(), &actor).await.unwrap();
    let err = lifecycle.register(tenant, &url, social(), &actor).await.unwrap_err();

    assert!(matches!(err, GadgetError::DuplicateRegistration { .. }));
    assert_eq!(repository.count_by_tenant(tenant).await.unwrap(), 1);
}

#[tokio::test]
async fn unreachable_source_persists_nothing() {
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let portal = node(repository.clone());
    let tenant = TenantId::new();

    // Port 1 is reserved and never listening
    let err = portal
        .lifecycle()
        .register(tenant, "http://127.0.0.1:1/gadgets/missing.xml", social(), &Actor::new("admin"))
        .await
        .unwrap_err();

    assert!(matches!(err, GadgetError::InvalidSourceDefinition { .. }));
    assert!(repository.list_all().await.unwrap().is_empty());
    assert_eq!(portal.permissions().resource_count(), 0);
    assert_eq!(portal.container().registered_count(), 0);
}

#[tokio::test]
async fn non_gadget_document_is_invalid_source() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/index.html")
        .with_status(200)
        .with_body("<html><body>hello</body></html>")
        .create_async()
        .await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let portal = node(repository.clone());

    let err = portal
        .lifecycle()
        .register(
            TenantId::new(),
            &format!("{}/index.html", server.url()),
            social(),
            &Actor::new("admin"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GadgetError::InvalidSourceDefinition { .. }));
    assert!(repository.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn deregister_twice_returns_not_found() {
    let server = gadget_server().await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let portal = node(repository.clone());
    let lifecycle = portal.lifecycle();
    let registered = lifecycle
        .register(
            TenantId::new(),
            &format!("{}/gadgets/weather.xml", server.url()),
            social(),
            &Actor::new("admin"),
        )
        .await
        .unwrap();

    lifecycle.deregister(registered.id).await.unwrap();
    let err = lifecycle.deregister(registered.id).await.unwrap_err();
    assert!(matches!(err, GadgetError::NotFound(_)));

    // Container-side teardown tolerates an instance that is already gone
    assert!(!lifecycle
        .destroy_gadget(registered.external_id, registered.tenant_id)
        .await
        .unwrap());
}

#[tokio::test]
async fn update_with_empty_categories_leaves_tags_unchanged() {
    let server = gadget_server().await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let portal = node(repository.clone());
    let lifecycle = portal.lifecycle();
    let actor = Actor::new("admin");
    let registered = lifecycle
        .register(
            TenantId::new(),
            &format!("{}/gadgets/weather.xml", server.url()),
            PortletCategories::parse("social,news"),
            &actor,
        )
        .await
        .unwrap();

    let err = lifecycle
        .update(registered.id, PortletCategories::parse(""), &actor)
        .await
        .unwrap_err();

    assert!(matches!(err, GadgetError::CategoryRequired));
    let stored = repository.find_by_id(registered.id).await.unwrap().unwrap();
    assert_eq!(stored.categories.to_delimited(), "social,news");
    assert_eq!(stored.modified_at, registered.modified_at);
}

#[tokio::test]
async fn restart_reconciles_persisted_registrations() {
    let server = gadget_server().await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let tenant = TenantId::new();

    let first = node(repository.clone());
    for name in ["a", "b", "c"] {
        first
            .lifecycle()
            .register(
                tenant,
                &format!("{}/gadgets/{}.xml", server.url(), name),
                social(),
                &Actor::new("admin"),
            )
            .await
            .unwrap();
    }
    let report = first.shutdown().await.unwrap();
    assert_eq!(report.processed, 3);

    let mut second = node(repository.clone());
    assert_eq!(second.container().registered_count(), 0);
    let report = second.start().await.unwrap();
    assert_eq!(report.succeeded(), 3);
    assert_eq!(second.container().registered_count(), 3);
}

/// Permission service whose revocation fails for selected registrations
struct FlakyPermissions {
    failing: HashSet<GadgetId>,
}

#[async_trait]
impl ResourcePermissionService for FlakyPermissions {
    async fn add_resources(
        &self,
        _resource: &ResourceRef,
        _grants: BaselineGrants,
    ) -> Result<(), AccessControlError> {
        Ok(())
    }

    async fn delete_resource(&self, resource: &ResourceRef) -> Result<(), AccessControlError> {
        if self.failing.contains(&resource.primary_key) {
            return Err(AccessControlError::Backend("permission store offline".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn bulk_deregister_continues_past_failures() {
    let server = gadget_server().await;
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let config = PortalConfigManifest::default();
    let container = Arc::new(InMemoryPortletContainer::with_template(
        config.spec.gadgets.template_id(),
        config.spec.gadgets.portlet_app.clone(),
    ));
    let materializer = Arc::new(PortletMaterializer::from_config(
        Arc::new(InstanceCache::new()),
        container.clone(),
        &config.spec.gadgets,
    ));

    // Ids are allocated from 1 by the in-memory repository
    let service = StandardGadgetLifecycleService::new(
        repository.clone(),
        Arc::new(HttpGadgetDefinitionFetcher::new(Duration::from_secs(2)).unwrap()),
        Arc::new(FlakyPermissions {
            failing: HashSet::from([GadgetId(2)]),
        }),
        Arc::new(InMemoryCredentialGrantService::new()),
        materializer,
        Arc::new(EventBus::new(64)),
        LifecycleSettings::from_config(&config),
    );

    let tenant = TenantId::new();
    for name in ["a", "b", "c", "d"] {
        service
            .register(
                tenant,
                &format!("{}/gadgets/{}.xml", server.url(), name),
                social(),
                &Actor::new("admin"),
            )
            .await
            .unwrap();
    }

    let report = service.deregister_all(tenant).await.unwrap();

    assert_eq!(report.processed, 4);
    assert_eq!(report.failures, 1);
    assert_eq!(report.errors[0].gadget_id, GadgetId(2));
    assert_eq!(container.registered_count(), 0);
    assert_eq!(repository.count_by_tenant(tenant).await.unwrap(), 0);
}

/// Container whose deployment fails for selected portlets
struct FlakyContainer {
    inner: InMemoryPortletContainer,
    failing: HashSet<PortletId>,
}

#[async_trait]
impl PortletContainer for FlakyContainer {
    async fn clone_template(&self, template_id: &PortletId) -> Result<PortletTemplate, ContainerError> {
        self.inner.clone_template(template_id).await
    }

    async fn register_instance(
        &self,
        definition: Arc<MaterializedPortletDefinition>,
        bag: PortletBag,
    ) -> Result<(), ContainerError> {
        self.inner.register_instance(definition, bag).await
    }

    async fn deploy(
        &self,
        portlet_id: &PortletId,
        categories: &PortletCategories,
    ) -> Result<(), ContainerError> {
        if self.failing.contains(portlet_id) {
            return Err(ContainerError::Internal("category store offline".to_string()));
        }
        self.inner.deploy(portlet_id, categories).await
    }

    async fn deregister_instance(
        &self,
        tenant_id: TenantId,
        portlet_id: &PortletId,
    ) -> Result<bool, ContainerError> {
        self.inner.deregister_instance(tenant_id, portlet_id).await
    }
}

#[tokio::test]
async fn bulk_materialize_continues_past_failures() {
    let repository = Arc::new(InMemoryGadgetRepository::new());
    let config = PortalConfigManifest::default();
    let tenant = TenantId::new();

    let mut external_ids = Vec::new();
    for name in ["a", "b", "c"] {
        let external_id = ExternalId::new();
        let id = repository.next_id().await.unwrap();
        repository
            .insert(&GadgetRegistration::new(
                id,
                external_id,
                tenant,
                format!("http://gadgets.test/{}.xml", name),
                name,
                social(),
            ))
            .await
            .unwrap();
        external_ids.push(external_id);
    }

    let broken = PortletId::for_external_id(&external_ids[1]);
    let container = Arc::new(FlakyContainer {
        inner: InMemoryPortletContainer::with_template(
            config.spec.gadgets.template_id(),
            config.spec.gadgets.portlet_app.clone(),
        ),
        failing: HashSet::from([broken.clone()]),
    });
    let materializer = Arc::new(PortletMaterializer::from_config(
        Arc::new(InstanceCache::new()),
        container.clone(),
        &config.spec.gadgets,
    ));
    let service = StandardGadgetLifecycleService::new(
        repository.clone(),
        Arc::new(HttpGadgetDefinitionFetcher::new(Duration::from_secs(2)).unwrap()),
        Arc::new(FlakyPermissions {
            failing: HashSet::new(),
        }),
        Arc::new(InMemoryCredentialGrantService::new()),
        materializer,
        Arc::new(EventBus::new(64)),
        LifecycleSettings::from_config(&config),
    );

    let report = service.materialize_all().await.unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.failures, 1);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.errors[0].gadget_id, GadgetId(2));
    for external_id in [external_ids[0], external_ids[2]] {
        let portlet_id = PortletId::for_external_id(&external_id);
        assert_eq!(container.inner.deployed_categories(&portlet_id), Some(social()));
    }
    assert_eq!(container.inner.deployed_categories(&broken), None);
    assert_eq!(repository.count_by_tenant(tenant).await.unwrap(), 3);
}
