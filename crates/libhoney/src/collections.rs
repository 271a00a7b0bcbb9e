// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Containers that report every mutation.
//!
//! Each decorator owns its inner container and forwards to it. Every mutating method
//! performs exactly one [`Observe::observe`] call before delegating; reads go through
//! `Deref` and are not observed.

use crate::config::HoneyConfig;
use crate::event::{Event, FieldValue};
use crate::honey::Honey;
use serde::Serialize;
use serde_json::Value;
use std::any::type_name;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::ops::Deref;
use std::sync::Arc;

pub const ELEMENT_TYPE: &str = "element-type";
pub const DEFAULT_LIST_PREFIX: &str = "traceable-mutable-list";
pub const DEFAULT_SET_PREFIX: &str = "traceable-mutable-set";
pub const DEFAULT_MAP_PREFIX: &str = "traceable-mutable-map";

pub trait Observe {
    /// `operation` names the mutation, `element` is what it was applied to.
    fn observe(&self, prefix: &str, operation: &str, element: FieldValue, element_type: &str);
}

impl<O: Observe + ?Sized> Observe for Arc<O> {
    fn observe(&self, prefix: &str, operation: &str, element: FieldValue, element_type: &str) {
        (**self).observe(prefix, operation, element, element_type)
    }
}

/// Sends one event per mutation through [`Honey::send`].
#[derive(Debug, Clone)]
pub struct EventObserver {
    honey: Honey,
    config: HoneyConfig,
}

impl EventObserver {
    pub fn new(honey: Honey, config: HoneyConfig) -> Self {
        Self { honey, config }
    }
}

impl Observe for EventObserver {
    fn observe(&self, prefix: &str, operation: &str, element: FieldValue, element_type: &str) {
        let event = Event::from_config(&self.config)
            .add(format!("{prefix}.{operation}"), element)
            .add(ELEMENT_TYPE, element_type);
        self.honey.send(&event);
    }
}

fn pair<K: Serialize, V: Serialize>(key: &K, value: &V) -> FieldValue {
    FieldValue::Pair(
        serde_json::to_value(key).unwrap_or_default(),
        serde_json::to_value(value).unwrap_or_default(),
    )
}

pub struct ObservableVec<T, O> {
    inner: Vec<T>,
    prefix: String,
    observer: O,
}

impl<T, O: Observe> ObservableVec<T, O> {
    pub fn new(observer: O) -> Self {
        Self::from_vec(Vec::new(), observer)
    }

    pub fn from_vec(inner: Vec<T>, observer: O) -> Self {
        Self {
            inner,
            prefix: DEFAULT_LIST_PREFIX.to_string(),
            observer,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn into_inner(self) -> Vec<T> {
        self.inner
    }

    pub fn clear(&mut self) {
        self.observer.observe(
            &self.prefix,
            "clear",
            self.inner.len().into(),
            type_name::<usize>(),
        );
        self.inner.clear();
    }
}

impl<T: Serialize, O: Observe> ObservableVec<T, O> {
    pub fn push(&mut self, value: T) {
        self.observer.observe(
            &self.prefix,
            "push",
            FieldValue::from_serialize(&value),
            type_name::<T>(),
        );
        self.inner.push(value);
    }

    pub fn insert(&mut self, index: usize, value: T) {
        self.observer.observe(
            &self.prefix,
            "insert",
            FieldValue::from_serialize(&value),
            type_name::<T>(),
        );
        self.inner.insert(index, value);
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = T>) {
        let values: Vec<T> = values.into_iter().collect();
        self.observer.observe(
            &self.prefix,
            "extend",
            FieldValue::from_serialize(&values),
            type_name::<Vec<T>>(),
        );
        self.inner.extend(values);
    }

    /// Observes the index; panics like [`Vec::remove`] when it is out of bounds.
    pub fn remove(&mut self, index: usize) -> T {
        self.observer
            .observe(&self.prefix, "remove", index.into(), type_name::<usize>());
        self.inner.remove(index)
    }

    /// Removes every element equal to one of `values`.
    pub fn remove_all(&mut self, values: &[T])
    where
        T: PartialEq,
    {
        self.observer.observe(
            &self.prefix,
            "remove_all",
            FieldValue::from_serialize(values),
            type_name::<[T]>(),
        );
        self.inner.retain(|item| !values.contains(item));
    }
}

impl<T, O> Deref for ObservableVec<T, O> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct ObservableSet<T, O> {
    inner: HashSet<T>,
    prefix: String,
    observer: O,
}

impl<T: Eq + Hash, O: Observe> ObservableSet<T, O> {
    pub fn new(observer: O) -> Self {
        Self::from_set(HashSet::new(), observer)
    }

    pub fn from_set(inner: HashSet<T>, observer: O) -> Self {
        Self {
            inner,
            prefix: DEFAULT_SET_PREFIX.to_string(),
            observer,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn into_inner(self) -> HashSet<T> {
        self.inner
    }

    pub fn clear(&mut self) {
        self.observer.observe(
            &self.prefix,
            "clear",
            self.inner.len().into(),
            type_name::<usize>(),
        );
        self.inner.clear();
    }
}

impl<T: Eq + Hash + Serialize, O: Observe> ObservableSet<T, O> {
    pub fn insert(&mut self, value: T) -> bool {
        self.observer.observe(
            &self.prefix,
            "insert",
            FieldValue::from_serialize(&value),
            type_name::<T>(),
        );
        self.inner.insert(value)
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = T>) {
        let values: Vec<T> = values.into_iter().collect();
        self.observer.observe(
            &self.prefix,
            "extend",
            FieldValue::from_serialize(&values),
            type_name::<Vec<T>>(),
        );
        self.inner.extend(values);
    }

    pub fn remove(&mut self, value: &T) -> bool {
        self.observer.observe(
            &self.prefix,
            "remove",
            FieldValue::from_serialize(value),
            type_name::<T>(),
        );
        self.inner.remove(value)
    }

    pub fn remove_all(&mut self, values: &[T]) {
        self.observer.observe(
            &self.prefix,
            "remove_all",
            FieldValue::from_serialize(values),
            type_name::<[T]>(),
        );
        for value in values {
            self.inner.remove(value);
        }
    }
}

impl<T, O> Deref for ObservableSet<T, O> {
    type Target = HashSet<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct ObservableMap<K, V, O> {
    inner: HashMap<K, V>,
    prefix: String,
    observer: O,
}

impl<K: Eq + Hash, V, O: Observe> ObservableMap<K, V, O> {
    pub fn new(observer: O) -> Self {
        Self::from_map(HashMap::new(), observer)
    }

    pub fn from_map(inner: HashMap<K, V>, observer: O) -> Self {
        Self {
            inner,
            prefix: DEFAULT_MAP_PREFIX.to_string(),
            observer,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn into_inner(self) -> HashMap<K, V> {
        self.inner
    }

    pub fn clear(&mut self) {
        self.observer.observe(
            &self.prefix,
            "clear",
            self.inner.len().into(),
            type_name::<usize>(),
        );
        self.inner.clear();
    }
}

impl<K: Eq + Hash + Serialize, V: Serialize, O: Observe> ObservableMap<K, V, O> {
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.observer.observe(
            &self.prefix,
            "insert",
            pair(&key, &value),
            type_name::<(K, V)>(),
        );
        self.inner.insert(key, value)
    }

    /// Entries are reported as a list of `[key, value]` pairs.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = (K, V)>) {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        let observed: Vec<Value> = entries
            .iter()
            .map(|(key, value)| pair(key, value).normalize())
            .collect();
        self.observer.observe(
            &self.prefix,
            "extend",
            FieldValue::Sequence(observed),
            type_name::<Vec<(K, V)>>(),
        );
        self.inner.extend(entries);
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.observer.observe(
            &self.prefix,
            "remove",
            FieldValue::from_serialize(key),
            type_name::<K>(),
        );
        self.inner.remove(key)
    }

    pub fn remove_all(&mut self, keys: &[K]) {
        self.observer.observe(
            &self.prefix,
            "remove_all",
            FieldValue::from_serialize(keys),
            type_name::<[K]>(),
        );
        for key in keys {
            self.inner.remove(key);
        }
    }
}

impl<K, V, O> Deref for ObservableMap<K, V, O> {
    type Target = HashMap<K, V>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
