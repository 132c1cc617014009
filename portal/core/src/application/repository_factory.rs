// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the concrete `GadgetRepository` for the configured storage
//! backend, keeping the domain layer free of infrastructure dependencies:
//! - Domain layer: defines the repository trait
//! - Application layer: picks an implementation
//! - Infrastructure layer: provides the implementations

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::domain::repository::{GadgetRepository, StorageBackend};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::postgres_gadget::PostgresGadgetRepository;
use crate::infrastructure::repositories::InMemoryGadgetRepository;

/// Creates a GadgetRepository implementation based on the configured backend
pub async fn create_gadget_repository(backend: &StorageBackend) -> Result<Arc<dyn GadgetRepository>> {
    match backend {
        StorageBackend::InMemory => {
            info!("Using in-memory gadget repository");
            Ok(Arc::new(InMemoryGadgetRepository::new()))
        }
        StorageBackend::PostgreSQL(config) => {
            let db = Database::new(&config.connection_string, config.max_connections).await?;
            info!(max_connections = config.max_connections, "Using PostgreSQL gadget repository");
            Ok(Arc::new(PostgresGadgetRepository::new(db.get_pool().clone())))
        }
    }
}
