// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster Event Listener
//!
//! Replays peers' materialize / invalidate events against this node's
//! materializer so every node's instance cache and container registry
//! converge. Events originating from this node are skipped: the originating
//! lifecycle call already applied them locally.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::materializer::PortletMaterializer;
use crate::domain::errors::GadgetResult;
use crate::domain::events::{GadgetClusterEvent, NodeId};
use crate::infrastructure::event_bus::{ClusterEventReceiver, EventBusError};

pub struct ClusterEventListener {
    node_id: NodeId,
    materializer: Arc<PortletMaterializer>,
}

impl ClusterEventListener {
    pub fn new(node_id: NodeId, materializer: Arc<PortletMaterializer>) -> Self {
        Self {
            node_id,
            materializer,
        }
    }

    /// Apply one peer event; returns `false` when the event was our own
    pub async fn apply(&self, event: &GadgetClusterEvent) -> GadgetResult<bool> {
        if event.origin() == &self.node_id {
            return Ok(false);
        }

        match event {
            GadgetClusterEvent::Materialize {
                external_id,
                tenant_id,
                display_name,
                categories,
                ..
            } => {
                self.materializer
                    .provision(*external_id, *tenant_id, display_name, categories)
                    .await?;
            }
            GadgetClusterEvent::Invalidate {
                external_id,
                tenant_id,
                ..
            } => {
                self.materializer.deprovision(*external_id, *tenant_id).await?;
            }
        }

        debug!(node = %self.node_id, origin = %event.origin(), external_id = %event.external_id(), "Applied cluster event");
        Ok(true)
    }

    /// Consume events until the bus closes
    pub async fn run(&self, mut receiver: ClusterEventReceiver) {
        info!(node = %self.node_id, "Cluster event listener started");
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.apply(&event).await {
                        error!(
                            node = %self.node_id,
                            origin = %event.origin(),
                            external_id = %event.external_id(),
                            error = %e,
                            "Failed to apply cluster event"
                        );
                    }
                }
                Err(EventBusError::Lagged(n)) => {
                    warn!(node = %self.node_id, missed = n, "Cluster listener lagged; run reconciliation to converge");
                }
                Err(EventBusError::Closed) => break,
                Err(EventBusError::Empty) => continue,
            }
        }
        info!(node = %self.node_id, "Cluster event listener stopped");
    }

    pub fn spawn(self: Arc<Self>, receiver: ClusterEventReceiver) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(receiver).await })
    }
}
