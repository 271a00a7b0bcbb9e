// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::Tuning;
use crate::errors::TransmitError;
use crate::http::build_client;
use crate::transmit::policy::Submission;
use crate::transmit::pool::{PoolConfig, ShutdownReport, WorkerPool};
use crate::transmit::request::{execute, Delivery, RawRequest};
use reqwest::blocking::Client;
use std::fmt::Debug;
use std::sync::OnceLock;
use tracing::debug;

/// Callback receiving the outcome of an asynchronous submission. Runs exactly once, on
/// a pool worker (or on the submitter when the retry policy runs the work inline).
pub type DeliveryHandler = Box<dyn FnOnce(Delivery) + Send + 'static>;

/// The only component performing network I/O.
pub struct TransmissionEngine {
    client: Client,
    tuning: Tuning,
    pool: OnceLock<WorkerPool>,
}

impl TransmissionEngine {
    pub fn new(tuning: Tuning) -> Result<Self, TransmitError> {
        tuning
            .validate()
            .map_err(|err| TransmitError::Client(err.to_string()))?;
        let client = build_client(tuning.https_proxy.as_deref(), tuning.request_timeout)
            .map_err(|err| TransmitError::Client(err.to_string()))?;
        Ok(Self {
            client,
            tuning,
            pool: OnceLock::new(),
        })
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// The pool is built on first use, which freezes the tuning for good.
    fn pool(&self) -> &WorkerPool {
        self.pool.get_or_init(|| {
            debug!(
                "Starting transmission pool|core:{}|max:{}|queue:{}|policy:{:?}",
                self.tuning.core_threads,
                self.tuning.thread_count,
                self.tuning.max_queue_size,
                self.tuning.rejection_policy
            );
            WorkerPool::new(
                PoolConfig::from(&self.tuning),
                self.tuning.rejection_policy.into(),
            )
        })
    }

    /// Executes `request` on the calling thread, bypassing the pool.
    pub fn submit_blocking(&self, request: RawRequest) -> Delivery {
        execute(&self.client, request)
    }

    pub fn submit_async(&self, request: RawRequest, handler: DeliveryHandler) -> Submission {
        self.submit_deferred(move || request, handler)
    }

    /// Like [`Self::submit_async`], but the request is only built once a worker picks the
    /// task up.
    pub fn submit_deferred<F>(&self, build: F, handler: DeliveryHandler) -> Submission
    where
        F: FnOnce() -> RawRequest + Send + 'static,
    {
        let client = self.client.clone();
        self.pool()
            .submit(Box::new(move || handler(execute(&client, build()))))
    }

    /// Running plus queued submissions. Advisory only.
    pub fn pending_count(&self) -> usize {
        self.pool.get().map_or(0, WorkerPool::pending)
    }

    pub fn dropped_count(&self) -> usize {
        self.pool.get().map_or(0, WorkerPool::dropped)
    }

    /// Stops accepting submissions and waits up to the configured grace period. Later
    /// submissions are dropped.
    pub fn shutdown(&self) -> ShutdownReport {
        self.pool().shutdown(self.tuning.shutdown_grace)
    }
}

impl Drop for TransmissionEngine {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.get() {
            if !pool.is_shut_down() {
                pool.shutdown(self.tuning.shutdown_grace);
            }
        }
    }
}

impl Debug for TransmissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionEngine")
            .field("tuning", &self.tuning)
            .field("started", &self.pool.get().is_some())
            .field("pending", &self.pending_count())
            .finish()
    }
}
