// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fields merged into every outgoing event.
//!
//! [`GlobalFields`] is a cheaply clonable handle; every clone shares one registry.
//! Merge order is fixed: dynamic producers are evaluated first, in registration
//! order, then static fields are applied on top. A static field therefore wins
//! over a dynamic field of the same name.

use crate::event::{Event, FieldValue};
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};

/// Zero argument producer of one field, evaluated on every merge.
pub type DynamicField = Arc<dyn Fn() -> (String, FieldValue) + Send + Sync>;

#[derive(Default)]
struct Registry {
    fields: Map<String, Value>,
    dynamic_fields: Vec<DynamicField>,
}

#[derive(Clone, Default)]
pub struct GlobalFields {
    registry: Arc<RwLock<Registry>>,
}

impl GlobalFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a static field. The value is normalized now, not at merge time.
    pub fn add_field(&self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let value = value.into().normalize();
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.fields.insert(name.into(), value);
    }

    /// Registers a producer whose result is recomputed for every merged event.
    pub fn add_dynamic_field<F, K, V>(&self, producer: F)
    where
        F: Fn() -> (K, V) + Send + Sync + 'static,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let producer: DynamicField = Arc::new(move || {
            let (name, value) = producer();
            (name.into(), value.into())
        });
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.dynamic_fields.push(producer);
    }

    pub fn clear_all_fields(&self) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.fields.clear();
        registry.dynamic_fields.clear();
    }

    pub fn is_empty(&self) -> bool {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.fields.is_empty() && registry.dynamic_fields.is_empty()
    }

    /// Returns `event` with the registry merged in. Producers run outside the lock, so
    /// they may themselves touch the registry.
    pub fn apply(&self, event: &Event) -> Event {
        let (fields, dynamic_fields) = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            (registry.fields.clone(), registry.dynamic_fields.clone())
        };

        let with_dynamic = if dynamic_fields.is_empty() {
            event.clone()
        } else {
            event.add_fields(dynamic_fields.iter().map(|producer| producer()))
        };
        with_dynamic.add_normalized(&fields)
    }
}

impl Debug for GlobalFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("GlobalFields")
            .field("fields", &registry.fields)
            .field("dynamic_fields", &registry.dynamic_fields.len())
            .finish()
    }
}
