// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for the gadget registration aggregate, following the
//! DDD Repository pattern: interface defined in the domain layer, implemented
//! in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `GadgetRepository` | `GadgetRegistration` | `InMemoryGadgetRepository`, `PostgresGadgetRepository` |
//!
//! ## Storage Backend Abstraction
//!
//! Concrete implementations are selected at startup based on configuration
//! (`gadget-portal.yaml`). The in-memory implementation is used for
//! development and testing; PostgreSQL for production.
//!
//! ## Uniqueness
//!
//! `(tenant_id, url)` uniqueness is enforced here, not by callers. A racing
//! insert that loses surfaces as [`RepositoryError::Conflict`].

use async_trait::async_trait;
use crate::domain::gadget::{ExternalId, GadgetId, GadgetRegistration, TenantId};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Repository interface for GadgetRegistration aggregates
#[async_trait]
pub trait GadgetRepository: Send + Sync {
    /// Allocate the next primary key
    async fn next_id(&self) -> Result<GadgetId, RepositoryError>;

    /// Insert a new registration; `Conflict` if the id or `(tenant, url)` is taken
    async fn insert(&self, registration: &GadgetRegistration) -> Result<(), RepositoryError>;

    /// Update an existing registration; `NotFound` if it does not exist
    async fn update(&self, registration: &GadgetRegistration) -> Result<(), RepositoryError>;

    /// Find registration by primary key
    async fn find_by_id(&self, id: GadgetId) -> Result<Option<GadgetRegistration>, RepositoryError>;

    /// Find registration by tenant and source URL
    async fn find_by_tenant_and_url(
        &self,
        tenant_id: TenantId,
        url: &str,
    ) -> Result<Option<GadgetRegistration>, RepositoryError>;

    /// Find registration by external identifier within a tenant
    async fn find_by_external_id(
        &self,
        external_id: ExternalId,
        tenant_id: TenantId,
    ) -> Result<Option<GadgetRegistration>, RepositoryError>;

    /// Page through a tenant's registrations ordered by id
    async fn find_by_tenant(
        &self,
        tenant_id: TenantId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<GadgetRegistration>, RepositoryError>;

    /// Count a tenant's registrations
    async fn count_by_tenant(&self, tenant_id: TenantId) -> Result<usize, RepositoryError>;

    /// List every registration across tenants ordered by id
    async fn list_all(&self) -> Result<Vec<GadgetRegistration>, RepositoryError>;

    /// Delete registration by ID; `NotFound` if it does not exist
    async fn delete(&self, id: GadgetId) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_errors_map_onto_repository_errors() {
        assert!(matches!(
            RepositoryError::from(sqlx::Error::RowNotFound),
            RepositoryError::NotFound(_)
        ));
        assert!(matches!(
            RepositoryError::from(sqlx::Error::PoolTimedOut),
            RepositoryError::Database(_)
        ));
    }
}
