// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster Replication Events
//!
//! Materialization and deprovisioning are node-local side effects. To keep
//! every node's instance cache and container registry consistent, the node
//! that performs a lifecycle step broadcasts it; peers replay it locally.
//!
//! Delivery is at-least-once and handlers must be idempotent: replaying a
//! `Materialize` hits the cache, replaying an `Invalidate` finds nothing to
//! remove.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::gadget::{ExternalId, GadgetId, PortletCategories, TenantId};

/// Identity of a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GadgetClusterEvent {
    Materialize {
        origin: NodeId,
        gadget_id: GadgetId,
        external_id: ExternalId,
        tenant_id: TenantId,
        display_name: String,
        categories: PortletCategories,
        emitted_at: DateTime<Utc>,
    },
    Invalidate {
        origin: NodeId,
        external_id: ExternalId,
        tenant_id: TenantId,
        emitted_at: DateTime<Utc>,
    },
}

impl GadgetClusterEvent {
    pub fn origin(&self) -> &NodeId {
        match self {
            GadgetClusterEvent::Materialize { origin, .. } => origin,
            GadgetClusterEvent::Invalidate { origin, .. } => origin,
        }
    }

    pub fn external_id(&self) -> ExternalId {
        match self {
            GadgetClusterEvent::Materialize { external_id, .. } => *external_id,
            GadgetClusterEvent::Invalidate { external_id, .. } => *external_id,
        }
    }
}

/// Domain events describing completed lifecycle transitions (observers only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GadgetLifecycleEvent {
    GadgetRegistered {
        gadget_id: GadgetId,
        tenant_id: TenantId,
        url: String,
        registered_at: DateTime<Utc>,
    },
    GadgetUpdated {
        gadget_id: GadgetId,
        categories: PortletCategories,
        updated_at: DateTime<Utc>,
    },
    GadgetDeregistered {
        gadget_id: GadgetId,
        tenant_id: TenantId,
        revoked_credentials: usize,
        deregistered_at: DateTime<Utc>,
    },
}

/// Outbound side of the inter-node channel and the local event stream
pub trait GadgetEventPublisher: Send + Sync {
    /// Replicate a node-local lifecycle step to every peer
    fn broadcast(&self, event: GadgetClusterEvent);

    fn publish_lifecycle(&self, event: GadgetLifecycleEvent);
}
