// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Gadget Portal Core
//!
//! Registers externally hosted gadgets, materializes each one as a portlet
//! in the portal's container and keeps every cluster node's portlet registry
//! in step with the persisted registrations.
//!
//! # Architecture
//!
//! - **domain:** aggregates, identifiers, ports (repository, container,
//!   access control, credentials, definition fetcher, events) and errors
//! - **application:** instance cache, materializer, lifecycle service,
//!   cluster listener, bootstrap
//! - **infrastructure:** in-memory and PostgreSQL adapters, HTTP fetcher,
//!   event bus

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
