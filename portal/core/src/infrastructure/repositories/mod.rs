// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the [`GadgetRepository`] abstraction
//! defined in the domain layer, following the Repository pattern from DDD.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve gadget registrations
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresGadgetRepository** - `gadget_registrations` table, ids from a
//!   database sequence, `(tenant_id, url)` enforced by a unique index
//! - **InMemoryGadgetRepository** - Thread-safe HashMap-backed storage for
//!   development and tests; enforces the same uniqueness rule
//!
//! # Usage
//!
//! ```no_run
//! use gadget_portal_core::infrastructure::db::Database;
//! use gadget_portal_core::infrastructure::repositories::postgres_gadget::PostgresGadgetRepository;
//!
//! # async fn example(database_url: &str) -> anyhow::Result<()> {
//! let db = Database::new(database_url, 5).await?;
//! let repo = PostgresGadgetRepository::new(db.get_pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod postgres_gadget;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::domain::gadget::{ExternalId, GadgetId, GadgetRegistration, TenantId};
use crate::domain::repository::{GadgetRepository, RepositoryError};

/// Registrations keyed by id; a `BTreeMap` keeps iteration in id order
#[derive(Clone)]
pub struct InMemoryGadgetRepository {
    registrations: Arc<RwLock<BTreeMap<GadgetId, GadgetRegistration>>>,
    sequence: Arc<AtomicI64>,
}

impl InMemoryGadgetRepository {
    pub fn new() -> Self {
        Self {
            registrations: Arc::new(RwLock::new(BTreeMap::new())),
            sequence: Arc::new(AtomicI64::new(0)),
        }
    }
}

impl Default for InMemoryGadgetRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GadgetRepository for InMemoryGadgetRepository {
    async fn next_id(&self) -> Result<GadgetId, RepositoryError> {
        Ok(GadgetId(self.sequence.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn insert(&self, registration: &GadgetRegistration) -> Result<(), RepositoryError> {
        let mut registrations = self.registrations.write();
        if registrations.contains_key(&registration.id) {
            return Err(RepositoryError::Conflict(format!(
                "gadget {} already exists",
                registration.id
            )));
        }
        if registrations
            .values()
            .any(|r| r.tenant_id == registration.tenant_id && r.url == registration.url)
        {
            return Err(RepositoryError::Conflict(format!(
                "gadget already registered for tenant {} at {}",
                registration.tenant_id, registration.url
            )));
        }
        registrations.insert(registration.id, registration.clone());
        Ok(())
    }

    async fn update(&self, registration: &GadgetRegistration) -> Result<(), RepositoryError> {
        let mut registrations = self.registrations.write();
        match registrations.get_mut(&registration.id) {
            Some(existing) => {
                *existing = registration.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("gadget {}", registration.id))),
        }
    }

    async fn find_by_id(&self, id: GadgetId) -> Result<Option<GadgetRegistration>, RepositoryError> {
        Ok(self.registrations.read().get(&id).cloned())
    }

    async fn find_by_tenant_and_url(
        &self,
        tenant_id: TenantId,
        url: &str,
    ) -> Result<Option<GadgetRegistration>, RepositoryError> {
        Ok(self
            .registrations
            .read()
            .values()
            .find(|r| r.tenant_id == tenant_id && r.url == url)
            .cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
    ) -> Result<Option<GadgetRegistration>, RepositoryError> {
        Ok(self
            .registrations
            .read()
            .values()
            .find(|r| r.external_id == external_id && r.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<GadgetRegistration>, RepositoryError> {
        Ok(self
            .registrations
            .read()
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<usize, RepositoryError> {
        Ok(self
            .registrations
            .read()
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .count())
    }

    async fn list_all(&self) -> Result<Vec<GadgetRegistration>, RepositoryError> {
        Ok(self.registrations.read().values().cloned().collect())
    }

    async fn delete(&self, id: GadgetId) -> Result<(), RepositoryError> {
        self.registrations
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("gadget {}", id)))
    }
}
