// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Immutable telemetry events.
//!
//! An [`Event`] is never changed in place: [`Event::add`] and [`Event::add_fields`]
//! return a successor that shares every attribute with its parent except the field
//! mapping. Values are normalized when they are added, see [`FieldValue`].

use crate::codec::format_timestamp;
use crate::config::{HoneyConfig, DEFAULT_API_HOST, DEFAULT_SAMPLE_RATE};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeSet, VecDeque};
use std::ops::{Range, RangeInclusive};
use std::sync::Arc;

/// The closed set of value kinds an event field can be built from.
///
/// Each kind has exactly one conversion rule into its stored (wire ready) form:
///
/// * `Timestamp` is formatted with [`format_timestamp`] (UTC, four fractional digits)
/// * `Range` and `Sequence` become a JSON array of their elements, in order
/// * `Pair` becomes a two element JSON array
/// * `Plain` is stored as is
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Timestamp(DateTime<Utc>),
    Range(Vec<i64>),
    Sequence(Vec<Value>),
    Pair(Value, Value),
    Plain(Value),
}

impl FieldValue {
    /// Builds a plain value from anything serde can represent. Values that cannot be
    /// represented as JSON (e.g. maps with non-string keys) are stored as `null`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        Self::Plain(serde_json::to_value(value).unwrap_or_default())
    }

    pub fn normalize(self) -> Value {
        match self {
            Self::Timestamp(timestamp) => Value::String(format_timestamp(&timestamp)),
            Self::Range(values) => Value::Array(values.into_iter().map(Value::from).collect()),
            Self::Sequence(values) => Value::Array(values),
            Self::Pair(first, second) => Value::Array(vec![first, second]),
            Self::Plain(value) => value,
        }
    }
}

macro_rules! plain_field_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    Self::Plain(Value::from(value))
                }
            }
        )*
    };
}

plain_field_value!(
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    Map<String, Value>,
);

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl<'a> From<&'a str> for FieldValue {
    fn from(value: &'a str) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl<'a> From<Cow<'a, str>> for FieldValue {
    fn from(value: Cow<'a, str>) -> Self {
        Self::Plain(Value::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        Self::Plain(value.map_or(Value::Null, Into::into))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for FieldValue {
    fn from(value: DateTime<Tz>) -> Self {
        Self::Timestamp(value.with_timezone(&Utc))
    }
}

/// Naive date-times carry no offset and are taken to be UTC.
impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value.and_utc())
    }
}

impl From<Range<i32>> for FieldValue {
    fn from(value: Range<i32>) -> Self {
        Self::Range(value.map(i64::from).collect())
    }
}

impl From<RangeInclusive<i32>> for FieldValue {
    fn from(value: RangeInclusive<i32>) -> Self {
        Self::Range(value.map(i64::from).collect())
    }
}

impl From<Range<i64>> for FieldValue {
    fn from(value: Range<i64>) -> Self {
        Self::Range(value.collect())
    }
}

impl From<RangeInclusive<i64>> for FieldValue {
    fn from(value: RangeInclusive<i64>) -> Self {
        Self::Range(value.collect())
    }
}

impl<T: Into<Value>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        Self::Sequence(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<VecDeque<T>> for FieldValue {
    fn from(value: VecDeque<T>) -> Self {
        Self::Sequence(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for FieldValue {
    fn from(value: BTreeSet<T>) -> Self {
        Self::Sequence(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for FieldValue {
    fn from(value: [T; N]) -> Self {
        Self::Sequence(value.into_iter().map(Into::into).collect())
    }
}

impl<'a, T: Clone + Into<Value>> From<&'a [T]> for FieldValue {
    fn from(value: &'a [T]) -> Self {
        Self::Sequence(value.iter().cloned().map(Into::into).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for FieldValue {
    fn from((first, second): (A, B)) -> Self {
        Self::Pair(first.into(), second.into())
    }
}

/// One telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    write_key: String,
    dataset: String,
    api_host: String,
    sample_rate: u32,
    timestamp: DateTime<Utc>,
    fields: Arc<Map<String, Value>>,
}

impl Event {
    /// Creates an empty event stamped with the current time, the default api host and a
    /// sample rate of 1.
    pub fn new(write_key: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            write_key: write_key.into(),
            dataset: dataset.into(),
            api_host: DEFAULT_API_HOST.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            timestamp: Utc::now(),
            fields: Arc::default(),
        }
    }

    pub fn from_config(config: &HoneyConfig) -> Self {
        Self::from_config_at(config, Utc::now())
    }

    pub fn from_config_at(config: &HoneyConfig, timestamp: DateTime<Utc>) -> Self {
        Self {
            write_key: config.write_key.clone(),
            dataset: config.dataset.clone(),
            api_host: config.api_host.clone(),
            sample_rate: config.sample_rate.max(1),
            timestamp,
            fields: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = api_host.into();
        self
    }

    /// A rate of 0 is raised to 1: every event represents at least itself.
    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns a new event holding every field of `self` plus `key`, normalized.
    /// `self` is left untouched.
    #[must_use]
    pub fn add(&self, key: impl Into<String>, value: impl Into<FieldValue>) -> Event {
        let mut fields = Map::clone(&self.fields);
        fields.insert(key.into(), value.into().normalize());
        self.successor(fields)
    }

    /// Bulk variant of [`Event::add`]. Later keys overwrite earlier same-named keys,
    /// including keys already present on `self`.
    #[must_use]
    pub fn add_fields<I, K, V>(&self, fields: I) -> Event
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let mut merged = Map::clone(&self.fields);
        for (key, value) in fields {
            merged.insert(key.into(), value.into().normalize());
        }
        self.successor(merged)
    }

    /// Merges values that are already normalized (global static fields).
    pub(crate) fn add_normalized(&self, fields: &Map<String, Value>) -> Event {
        if fields.is_empty() {
            return self.clone();
        }
        let mut merged = Map::clone(&self.fields);
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
        self.successor(merged)
    }

    fn successor(&self, fields: Map<String, Value>) -> Event {
        Event {
            write_key: self.write_key.clone(),
            dataset: self.dataset.clone(),
            api_host: self.api_host.clone(),
            sample_rate: self.sample_rate,
            timestamp: self.timestamp,
            fields: Arc::new(fields),
        }
    }

    pub fn write_key(&self) -> &str {
        &self.write_key
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
