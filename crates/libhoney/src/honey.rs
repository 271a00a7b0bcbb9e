// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Public send operations. Every event leaving through [`Honey`] has the shared
//! [`GlobalFields`] merged in first.

use crate::config::{HoneyConfig, Tuning};
use crate::errors::TransmitError;
use crate::event::Event;
use crate::global_fields::GlobalFields;
use crate::transmit::{
    Delivery, DeliveryHandler, RawRequest, ShutdownReport, Submission, TransmissionEngine,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cheap to clone; all clones share one engine and one registry.
///
/// Dropping the last clone shuts the engine down, waiting up to the configured grace
/// period for queued sends. A `Honey` held in a `static` is never dropped, so in that
/// setup call [`Honey::shutdown`] before returning from `main` or queued events are lost
/// at process exit.
#[derive(Clone, Debug)]
pub struct Honey {
    engine: Arc<TransmissionEngine>,
    global_fields: GlobalFields,
}

impl Honey {
    pub fn new(tuning: Tuning) -> Result<Self, TransmitError> {
        Self::with_global_fields(tuning, GlobalFields::new())
    }

    /// Shares an existing registry with this dispatcher.
    pub fn with_global_fields(
        tuning: Tuning,
        global_fields: GlobalFields,
    ) -> Result<Self, TransmitError> {
        Ok(Self {
            engine: Arc::new(TransmissionEngine::new(tuning)?),
            global_fields,
        })
    }

    pub fn global_fields(&self) -> &GlobalFields {
        &self.global_fields
    }

    pub(crate) fn engine(&self) -> &TransmissionEngine {
        &self.engine
    }

    /// Queues `event`; the outcome is logged.
    pub fn send(&self, event: &Event) -> Submission {
        self.send_with(event, Box::new(log_delivery))
    }

    /// Queues `event` and hands the outcome to `handler`. The merge with the global
    /// fields happens when a worker picks the event up.
    pub fn send_with(&self, event: &Event, handler: DeliveryHandler) -> Submission {
        let event = event.clone();
        let global_fields = self.global_fields.clone();
        self.engine.submit_deferred(
            move || RawRequest::event(&global_fields.apply(&event)),
            handler,
        )
    }

    pub fn blocking_send(&self, event: &Event) -> Delivery {
        let merged = self.global_fields.apply(event);
        self.engine.submit_blocking(RawRequest::event(&merged))
    }

    /// Sends `events` as one batch request to `config`'s dataset. Order is preserved.
    pub fn blocking_send_batch(&self, events: &[Event], config: &HoneyConfig) -> Delivery {
        let merged: Vec<Event> = events
            .iter()
            .map(|event| self.global_fields.apply(event))
            .collect();
        self.engine
            .submit_blocking(RawRequest::batch(&merged, config))
    }

    pub fn pending_transmissions(&self) -> usize {
        self.engine.pending_count()
    }

    /// Drains the engine now. Required for handles that are never dropped; after it
    /// returns, dropping the last handle does not wait again.
    pub fn shutdown(&self) -> ShutdownReport {
        self.engine.shutdown()
    }
}

/// Default handler for [`Honey::send`].
pub fn log_delivery(delivery: Delivery) {
    match &delivery.result {
        Ok(_) => debug!(
            "Sent {}|status:{}",
            delivery.request,
            delivery
                .status()
                .map_or_else(|| "none".to_string(), |status| status.to_string())
        ),
        Err(err) => warn!("Failed to send {}: {err}", delivery.request),
    }
}
