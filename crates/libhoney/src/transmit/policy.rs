// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! What happens to work the pool cannot accept.

use crate::config::RejectionPolicyKind;
use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// A unit of work run by the pool, or inline by a rejection policy.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Queue depth and busy workers at one instant. Advisory under concurrent mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSnapshot {
    pub queued: usize,
    pub active: usize,
}

/// How a submission was disposed of at submit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Accepted by the pool; a worker will run it.
    Queued,
    /// The queue was full and the submitting thread ran it.
    RanInline,
    /// Discarded. The task never ran and never will.
    Dropped,
}

pub trait RejectionPolicy: Send + Sync + Debug {
    /// Called on the submitting thread when the queue is full and no worker can be added.
    fn reject(&self, task: Task, snapshot: PoolSnapshot) -> Submission;
}

/// Caller-runs: the submitter absorbs the backpressure and nothing is lost.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryInline;

impl RejectionPolicy for RetryInline {
    fn reject(&self, task: Task, snapshot: PoolSnapshot) -> Submission {
        debug!(
            "Rejected execution, running on caller|queued:{}|active:{}",
            snapshot.queued, snapshot.active
        );
        run_guarded(task);
        Submission::RanInline
    }
}

/// Discard, leaving a warning so sustained overload is visible to operators.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropSilently;

impl RejectionPolicy for DropSilently {
    fn reject(&self, task: Task, snapshot: PoolSnapshot) -> Submission {
        drop(task);
        warn!(
            "Rejected execution, transmission dropped|queued:{}|active:{}",
            snapshot.queued, snapshot.active
        );
        Submission::Dropped
    }
}

impl From<RejectionPolicyKind> for Box<dyn RejectionPolicy> {
    fn from(kind: RejectionPolicyKind) -> Self {
        match kind {
            RejectionPolicyKind::Retry => Box::new(RetryInline),
            RejectionPolicyKind::Drop => Box::new(DropSilently),
        }
    }
}

/// Runs `task`, containing any panic so a faulty handler cannot take a worker (or the
/// submitting thread) down with it. Returns false if the task panicked.
pub(crate) fn run_guarded(task: Task) -> bool {
    match catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => true,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|reason| (*reason).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Transmission task panicked: {reason}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tracing_test::traced_test;

    fn flag_task(flag: &Arc<AtomicBool>) -> Task {
        let flag = Arc::clone(flag);
        Box::new(move || flag.store(true, Ordering::SeqCst))
    }

    #[test]
    #[traced_test]
    fn test_retry_inline_runs_on_the_caller() {
        let ran = Arc::new(AtomicBool::new(false));
        let caller = thread::current().id();
        let ran_on = Arc::new(std::sync::Mutex::new(None));
        let ran_on_task = Arc::clone(&ran_on);
        let ran_task = Arc::clone(&ran);

        let submission = RetryInline.reject(
            Box::new(move || {
                *ran_on_task.lock().expect("lock poisoned") = Some(thread::current().id());
                ran_task.store(true, Ordering::SeqCst);
            }),
            PoolSnapshot {
                queued: 3,
                active: 2,
            },
        );

        assert_eq!(submission, Submission::RanInline);
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(*ran_on.lock().expect("lock poisoned"), Some(caller));
        assert!(logs_contain("queued:3|active:2"));
    }

    #[test]
    #[traced_test]
    fn test_drop_silently_never_runs_the_task() {
        let ran = Arc::new(AtomicBool::new(false));

        let submission = DropSilently.reject(
            flag_task(&ran),
            PoolSnapshot {
                queued: 10,
                active: 4,
            },
        );

        assert_eq!(submission, Submission::Dropped);
        assert!(!ran.load(Ordering::SeqCst));
        assert!(logs_contain("transmission dropped|queued:10|active:4"));
    }

    #[test]
    fn test_policy_from_kind() {
        let ran = Arc::new(AtomicBool::new(false));
        let retry: Box<dyn RejectionPolicy> = RejectionPolicyKind::Retry.into();
        assert_eq!(
            retry.reject(flag_task(&ran), PoolSnapshot::default()),
            Submission::RanInline
        );
        assert!(ran.load(Ordering::SeqCst));

        let dropped: Box<dyn RejectionPolicy> = RejectionPolicyKind::Drop.into();
        assert_eq!(
            dropped.reject(Box::new(|| {}), PoolSnapshot::default()),
            Submission::Dropped
        );
    }

    #[test]
    #[traced_test]
    fn test_inline_panics_are_contained() {
        let submission = RetryInline.reject(
            Box::new(|| panic!("handler exploded")),
            PoolSnapshot::default(),
        );
        assert_eq!(submission, Submission::RanInline);
        assert!(logs_contain("handler exploded"));
    }
}
