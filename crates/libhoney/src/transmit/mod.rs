// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod engine;
pub mod policy;
pub mod pool;
pub mod request;

pub use engine::{DeliveryHandler, TransmissionEngine};
pub use policy::{DropSilently, PoolSnapshot, RejectionPolicy, RetryInline, Submission, Task};
pub use pool::{PoolConfig, ShutdownReport, WorkerPool};
pub use request::{CollectorResponse, Delivery, RawRequest};
