// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod access;
pub mod db;
pub mod definition_fetcher;
pub mod event_bus;
pub mod portlet_container;
pub mod repositories;

pub use event_bus::{ClusterEventReceiver, DomainEvent, EventBus, EventBusError, EventReceiver};
