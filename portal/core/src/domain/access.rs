// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Access-Control and Credential Ports
//!
//! Registrations own a resource identity in the access-control facade and
//! may have credential grants (OAuth consumers) issued against a derived key.
//! Both are revoked when the registration is deleted.

use async_trait::async_trait;

use crate::domain::gadget::{GadgetId, TenantId};

/// Resource name under which gadget registrations are protected
pub const GADGET_RESOURCE_NAME: &str = "GadgetRegistration";

/// Resource identity of one registration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub tenant_id: TenantId,
    pub name: &'static str,
    pub primary_key: GadgetId,
}

impl ResourceRef {
    pub fn gadget(tenant_id: TenantId, id: GadgetId) -> Self {
        Self {
            tenant_id,
            name: GADGET_RESOURCE_NAME,
            primary_key: id,
        }
    }
}

/// Which default grants accompany a new resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BaselineGrants {
    pub group: bool,
    pub guest: bool,
}

#[async_trait]
pub trait ResourcePermissionService: Send + Sync {
    /// Create the resource and its owner grants plus optional group/guest grants
    async fn add_resources(&self, resource: &ResourceRef, grants: BaselineGrants) -> Result<(), AccessControlError>;

    /// Remove the resource and every grant on it; absent resources are ignored
    async fn delete_resource(&self, resource: &ResourceRef) -> Result<(), AccessControlError>;
}

#[async_trait]
pub trait CredentialGrantService: Send + Sync {
    /// Revoke every credential grant issued under `key`, returning how many went
    async fn revoke_all(&self, key: &str) -> Result<usize, AccessControlError>;
}

/// Key credential grants for a published gadget are issued under
pub fn published_gadget_key(prefix: &str, id: GadgetId) -> String {
    format!("{}{}", prefix, id.0)
}

#[derive(Debug, thiserror::Error)]
pub enum AccessControlError {
    #[error("Access control backend error: {0}")]
    Backend(String),
}
