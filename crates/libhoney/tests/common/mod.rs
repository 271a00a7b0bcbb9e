// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use libhoney::transmit::DeliveryHandler;
use libhoney::{HoneyConfig, RejectionPolicyKind, Tuning};
use mockito::Server;
use std::time::{Duration, Instant};

pub const WRITE_KEY: &str = "test-write-key";
pub const DATASET: &str = "test_dataset";

pub fn config(server: &Server) -> HoneyConfig {
    HoneyConfig::new(WRITE_KEY, DATASET).with_api_host(server.url())
}

/// One worker and a single queue slot, so saturation is easy to reach.
pub fn single_slot_tuning(policy: RejectionPolicyKind) -> Tuning {
    Tuning {
        core_threads: 1,
        thread_count: 1,
        max_queue_size: 1,
        rejection_policy: policy,
        ..Tuning::default()
    }
}

/// A handler that holds its worker until the returned sender is dropped or signalled.
pub fn blocking_handler() -> (DeliveryHandler, Sender<()>) {
    let (release, wait): (Sender<()>, Receiver<()>) = unbounded();
    (
        Box::new(move |_| {
            let _ = wait.recv();
        }),
        release,
    )
}

pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
