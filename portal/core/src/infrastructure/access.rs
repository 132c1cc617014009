// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory access-control and credential facades.
//!
//! Stand-ins for the portal's permission and OAuth consumer services, used
//! by the in-memory deployment profile and by tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::domain::access::{
    AccessControlError, BaselineGrants, CredentialGrantService, ResourcePermissionService,
    ResourceRef,
};

pub const OWNER_ROLE: &str = "owner";
pub const GROUP_ROLE: &str = "group";
pub const GUEST_ROLE: &str = "guest";

#[derive(Clone, Default)]
pub struct InMemoryResourcePermissionService {
    grants: Arc<RwLock<HashMap<ResourceRef, BTreeSet<&'static str>>>>,
}

impl InMemoryResourcePermissionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roles granted on a resource, `None` if the resource does not exist
    pub fn roles(&self, resource: &ResourceRef) -> Option<BTreeSet<&'static str>> {
        self.grants.read().get(resource).cloned()
    }

    pub fn resource_count(&self) -> usize {
        self.grants.read().len()
    }
}

#[async_trait]
impl ResourcePermissionService for InMemoryResourcePermissionService {
    async fn add_resources(
        &self,
        resource: &ResourceRef,
        grants: BaselineGrants,
    ) -> Result<(), AccessControlError> {
        let mut roles = BTreeSet::from([OWNER_ROLE]);
        if grants.group {
            roles.insert(GROUP_ROLE);
        }
        if grants.guest {
            roles.insert(GUEST_ROLE);
        }
        self.grants.write().insert(resource.clone(), roles);
        Ok(())
    }

    async fn delete_resource(&self, resource: &ResourceRef) -> Result<(), AccessControlError> {
        self.grants.write().remove(resource);
        Ok(())
    }
}

/// Credential grants (consumer keys) indexed by the key they were issued under
#[derive(Clone, Default)]
pub struct InMemoryCredentialGrantService {
    grants: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl InMemoryCredentialGrantService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, key: impl Into<String>, consumer: impl Into<String>) {
        self.grants
            .write()
            .entry(key.into())
            .or_default()
            .push(consumer.into());
    }

    pub fn grant_count(&self, key: &str) -> usize {
        self.grants.read().get(key).map_or(0, Vec::len)
    }
}

#[async_trait]
impl CredentialGrantService for InMemoryCredentialGrantService {
    async fn revoke_all(&self, key: &str) -> Result<usize, AccessControlError> {
        Ok(self.grants.write().remove(key).map_or(0, |grants| grants.len()))
    }
}
