// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client side event emitter for the Honeycomb collector API.
//!
//! Events are immutable field sets built with [`Event::add`]. A [`Honey`] dispatcher
//! merges the shared [`GlobalFields`] into each event and hands it to the
//! [`TransmissionEngine`], either on the caller's thread ([`Honey::blocking_send`]) or
//! through a bounded worker pool ([`Honey::send`]).

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]

pub mod codec;
pub mod collections;
pub mod config;
pub mod errors;
pub mod event;
pub mod global_fields;
pub mod honey;
pub mod http;
pub mod marker;
pub mod transmit;

pub use config::{HoneyConfig, RejectionPolicyKind, Tuning};
pub use errors::{ConfigError, TransmitError};
pub use event::{Event, FieldValue};
pub use global_fields::GlobalFields;
pub use honey::Honey;
pub use marker::Marker;
pub use transmit::{Delivery, ShutdownReport, Submission, TransmissionEngine};
