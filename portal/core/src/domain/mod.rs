// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Aggregates, value objects and the ports (traits) the application layer
//! drives. Nothing in here talks to the network or a database.

pub mod gadget;
pub mod portlet;
pub mod repository;
pub mod container;
pub mod access;
pub mod definition;
pub mod events;
pub mod errors;
pub mod portal_config;
