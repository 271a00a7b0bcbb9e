// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire representation of events.
//!
//! A single event is posted as its bare field mapping. Batches are posted as an
//! ordered array of envelopes:
//!
//! ```text
//! [{"time": "2024-03-01T12:30:00.0000Z", "samplerate": 1, "data": {...}}, ...]
//! ```

use crate::event::Event;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Renders `timestamp` as `yyyy-MM-ddTHH:mm:ss.SSSSZ`: UTC, four fractional digits.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    // chrono has no four digit fraction specifier
    let tenths_of_millis = timestamp.timestamp_subsec_nanos() % 1_000_000_000 / 100_000;
    format!(
        "{}.{:04}Z",
        timestamp.format("%Y-%m-%dT%H:%M:%S"),
        tenths_of_millis
    )
}

/// The event's normalized fields, with no envelope.
pub fn to_json(event: &Event) -> Value {
    Value::Object(event.fields().clone())
}

pub fn to_wire_envelope(event: &Event) -> Value {
    let mut envelope = Map::with_capacity(3);
    envelope.insert(
        "time".to_string(),
        Value::String(format_timestamp(&event.timestamp())),
    );
    envelope.insert("samplerate".to_string(), Value::from(event.sample_rate()));
    envelope.insert("data".to_string(), to_json(event));
    Value::Object(envelope)
}

/// Envelopes for every event, in the order given.
pub fn to_batch(events: &[Event]) -> Value {
    Value::Array(events.iter().map(to_wire_envelope).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HoneyConfig;
    use chrono::TimeZone;
    use regex::Regex;
    use serde_json::json;

    fn timestamp_pattern() -> Regex {
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{4}Z$").expect("valid regex")
    }

    #[test]
    fn test_format_timestamp_truncates_to_four_digits() {
        let timestamp = Utc
            .with_ymd_and_hms(2019, 1, 2, 3, 4, 5)
            .single()
            .expect("unambiguous")
            + chrono::Duration::nanoseconds(123_456_789);
        assert_eq!(format_timestamp(&timestamp), "2019-01-02T03:04:05.1234Z");
    }

    #[test]
    fn test_format_timestamp_matches_pattern() {
        let formatted = format_timestamp(&Utc::now());
        assert!(
            timestamp_pattern().is_match(&formatted),
            "unexpected timestamp {formatted}"
        );
    }

    #[test]
    fn test_single_event_serializes_bare_fields() {
        let event = Event::from_config(&HoneyConfig::new("key", "ds")).add("n", 1);
        assert_eq!(to_json(&event), json!({"n": 1}));
        assert_eq!(to_json(&event).to_string(), r#"{"n":1}"#);
    }

    #[test]
    fn test_envelope_wraps_time_samplerate_and_data() {
        let now = Utc::now();
        let config = HoneyConfig::new("key", "ds").with_sample_rate(1);
        let event = Event::from_config_at(&config, now).add("n", 1);

        let envelope = to_wire_envelope(&event);
        assert_eq!(
            envelope,
            json!({"time": format_timestamp(&now), "samplerate": 1, "data": {"n": 1}})
        );
        let time = envelope["time"].as_str().expect("time is a string");
        assert!(timestamp_pattern().is_match(time));
    }

    #[test]
    fn test_batch_preserves_order() {
        let config = HoneyConfig::new("key", "ds");
        let events = vec![
            Event::from_config(&config).add("seq", 1),
            Event::from_config(&config).with_sample_rate(4).add("seq", 2),
        ];

        let batch = to_batch(&events);
        let entries = batch.as_array().expect("batch is an array");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["data"], json!({"seq": 1}));
        assert_eq!(entries[1]["data"], json!({"seq": 2}));
        assert_eq!(entries[1]["samplerate"], json!(4));
        for entry in entries {
            let keys: Vec<&str> = entry
                .as_object()
                .expect("envelope is an object")
                .keys()
                .map(String::as_str)
                .collect();
            assert_eq!(keys, vec!["time", "samplerate", "data"]);
        }
    }
}
