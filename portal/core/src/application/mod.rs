// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod bootstrap;
pub mod cluster;
pub mod gadget_lifecycle;
pub mod instance_cache;
pub mod materializer;
pub mod repository_factory;

// Re-export use cases for convenience
pub use bootstrap::GadgetPortal;
pub use cluster::ClusterEventListener;
pub use gadget_lifecycle::{
    BulkFailure, BulkReport, GadgetLifecycleService, LifecycleSettings,
    StandardGadgetLifecycleService,
};
pub use instance_cache::{CacheLookup, InstanceCache};
pub use materializer::PortletMaterializer;
