// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Instance Cache
//!
//! Process-local map from external identifier to the materialized portlet
//! definition. Populated lazily, emptied on deprovision, never persisted.
//!
//! # Concurrency
//!
//! Each key owns a slot (`OnceCell`) stored in a sharded `DashMap`, so there
//! is no global lock and keys never contend with each other. Concurrent
//! callers racing on the same key share one slot: exactly one initializer
//! runs, the others await its result. A failed initializer drops its slot,
//! or leaves it empty while other callers still wait on it, so the next
//! caller retries. Readers only ever see fully built
//! definitions because a slot is published only once its value is set.

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::domain::gadget::ExternalId;
use crate::domain::portlet::MaterializedPortletDefinition;

type Slot = Arc<OnceCell<Arc<MaterializedPortletDefinition>>>;

/// Outcome of [`InstanceCache::get_or_try_init`]
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub definition: Arc<MaterializedPortletDefinition>,
    /// `true` when this call ran the initializer
    pub initialized: bool,
}

#[derive(Default)]
pub struct InstanceCache {
    slots: DashMap<ExternalId, Slot>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached definition, if one is fully materialized
    pub fn get(&self, external_id: &ExternalId) -> Option<Arc<MaterializedPortletDefinition>> {
        self.slots
            .get(external_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Return the cached definition or run `init` once for this key
    pub async fn get_or_try_init<F, Fut, E>(
        &self,
        external_id: ExternalId,
        init: F,
    ) -> Result<CacheLookup, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<MaterializedPortletDefinition>, E>>,
    {
        let slot = self.slot(external_id);

        if let Some(definition) = slot.get() {
            return Ok(CacheLookup {
                definition: definition.clone(),
                initialized: false,
            });
        }

        let mut initialized = false;
        let result = slot
            .get_or_try_init(|| {
                initialized = true;
                init()
            })
            .await
            .cloned();

        match result {
            Ok(definition) => Ok(CacheLookup {
                definition,
                initialized,
            }),
            Err(e) => {
                // Drop the empty slot unless another caller is still waiting on it
                self.slots.remove_if(&external_id, |_, current| {
                    Arc::ptr_eq(current, &slot)
                        && !current.initialized()
                        && Arc::strong_count(current) == 2
                });
                Err(e)
            }
        }
    }

    /// Wait for an in-flight initializer of the key and return its result.
    ///
    /// Never runs an initializer and never removes anything.
    pub async fn settle(&self, external_id: &ExternalId) -> Option<Arc<MaterializedPortletDefinition>> {
        let slot = self.slots.get(external_id).map(|entry| entry.value().clone())?;
        if let Some(definition) = slot.get() {
            return Some(definition.clone());
        }
        let settled = slot
            .get_or_try_init(|| async { Err::<Arc<MaterializedPortletDefinition>, ()>(()) })
            .await
            .ok()
            .cloned();
        settled
    }

    /// Remove the key if its definition satisfies `predicate`.
    ///
    /// An empty slot is only removed when no initializer holds it.
    pub fn evict_if<P>(
        &self,
        external_id: &ExternalId,
        predicate: P,
    ) -> Option<Arc<MaterializedPortletDefinition>>
    where
        P: FnOnce(&MaterializedPortletDefinition) -> bool,
    {
        self.slots
            .remove_if(external_id, |_, slot| match slot.get() {
                Some(definition) => predicate(definition),
                None => Arc::strong_count(slot) == 1,
            })
            .and_then(|(_, slot)| slot.get().cloned())
    }

    /// Number of fully materialized entries
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|entry| entry.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, including ones whose initializer is still running
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, external_id: ExternalId) -> Slot {
        self.slots
            .entry(external_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}
