// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the gadget portal CLI

pub mod config;
pub mod gadget;

pub use self::config::ConfigCommand;
pub use self::gadget::GadgetCommand;
