// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded worker pool decoupling producers from network I/O.
//!
//! ```text
//!   submit ──► core workers < core_threads ? ──yes──► new worker runs the task
//!                   │ no
//!                   v
//!             bounded queue has room ? ──yes──► queued, picked up by any worker
//!                   │ no
//!                   v
//!             workers < thread_count ? ──yes──► new worker runs the task
//!                   │ no
//!                   v
//!             rejection policy (run inline | drop)
//! ```
//!
//! Workers are spawned lazily and detached: process exit never waits on them. Up to
//! `core_threads` workers block on the queue indefinitely; workers above that exit after
//! `keep_alive` without work.

use crate::config::Tuning;
use crate::transmit::policy::{run_guarded, PoolSnapshot, RejectionPolicy, Submission, Task};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

static POOL_SEQUENCE: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub core_threads: usize,
    pub max_threads: usize,
    pub queue_capacity: usize,
    pub keep_alive: Duration,
}

impl From<&Tuning> for PoolConfig {
    fn from(tuning: &Tuning) -> Self {
        Self {
            core_threads: tuning.core_threads,
            max_threads: tuning.thread_count.max(1),
            queue_capacity: tuning.max_queue_size.max(1),
            keep_alive: tuning.keep_alive,
        }
    }
}

/// Result of an orderly shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every queued and in-flight task finished inside the grace period.
    pub completed: bool,
    /// Queued tasks discarded without running once the grace period elapsed.
    pub abandoned: usize,
    /// Tasks still running when the grace period elapsed. They are left to finish or
    /// die with the process.
    pub in_flight: usize,
}

struct Shared {
    config: PoolConfig,
    receiver: Receiver<Task>,
    workers: Mutex<usize>,
    terminated: Condvar,
    active: AtomicUsize,
    abandoned: AtomicUsize,
    cancel: CancellationToken,
    pool_id: usize,
    thread_sequence: AtomicUsize,
}

impl Shared {
    fn lock_workers(&self) -> MutexGuard<'_, usize> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_reserve_worker(&self, limit: usize) -> bool {
        let mut workers = self.lock_workers();
        if *workers < limit {
            *workers += 1;
            true
        } else {
            false
        }
    }

    fn release_worker(&self) {
        let mut workers = self.lock_workers();
        *workers = workers.saturating_sub(1);
        self.terminated.notify_all();
    }

    fn above_core(&self) -> bool {
        *self.lock_workers() > self.config.core_threads
    }

    /// An idle worker above the core size leaves, unless it is the last one and work is
    /// waiting.
    fn retire_idle_worker(&self) -> bool {
        let mut workers = self.lock_workers();
        if *workers > self.config.core_threads && (*workers > 1 || self.receiver.is_empty()) {
            *workers -= 1;
            self.terminated.notify_all();
            true
        } else {
            false
        }
    }

    fn run(&self, task: Task) {
        if self.cancel.is_cancelled() {
            self.abandoned.fetch_add(1, Ordering::SeqCst);
            return;
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        run_guarded(task);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            queued: self.receiver.len(),
            active: self.active.load(Ordering::SeqCst),
        }
    }
}

fn run_worker(shared: Arc<Shared>, first_task: Option<Task>) {
    debug!("Transmission worker started");
    if let Some(task) = first_task {
        shared.run(task);
    }
    loop {
        // core workers wait without a deadline
        let next = if shared.above_core() {
            shared.receiver.recv_timeout(shared.config.keep_alive)
        } else {
            shared
                .receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected)
        };
        match next {
            Ok(task) => shared.run(task),
            Err(RecvTimeoutError::Timeout) => {
                if shared.retire_idle_worker() {
                    debug!("Transmission worker idle for {:?}, exiting", shared.config.keep_alive);
                    return;
                }
                trace!("Transmission worker keep-alive elapsed, staying for queued work");
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Transmission worker stopped");
    shared.release_worker();
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    sender: RwLock<Option<Sender<Task>>>,
    policy: Box<dyn RejectionPolicy>,
    dropped: AtomicUsize,
}

impl WorkerPool {
    pub fn new(config: PoolConfig, policy: Box<dyn RejectionPolicy>) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);
        let shared = Arc::new(Shared {
            config,
            receiver,
            workers: Mutex::new(0),
            terminated: Condvar::new(),
            active: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
            pool_id: POOL_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            thread_sequence: AtomicUsize::new(1),
        });
        Self {
            shared,
            sender: RwLock::new(Some(sender)),
            policy,
            dropped: AtomicUsize::new(0),
        }
    }

    /// Hands `task` to the pool. Returns immediately unless the queue is saturated and
    /// the policy runs the task on this thread.
    pub fn submit(&self, task: Task) -> Submission {
        let sender_guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender_guard.as_ref() else {
            drop(sender_guard);
            warn!("Transmission pool is shut down, dropping submission");
            self.dropped.fetch_add(1, Ordering::SeqCst);
            return Submission::Dropped;
        };

        if self.shared.try_reserve_worker(self.shared.config.core_threads) {
            return match self.spawn_worker(Some(task)) {
                Ok(()) => Submission::Queued,
                Err(returned) => {
                    drop(sender_guard);
                    self.reject_unspawned(returned)
                }
            };
        }

        let task = match sender.try_send(task) {
            Ok(()) => {
                self.ensure_worker();
                return Submission::Queued;
            }
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => task,
        };

        if self.shared.try_reserve_worker(self.shared.config.max_threads) {
            return match self.spawn_worker(Some(task)) {
                Ok(()) => Submission::Queued,
                Err(returned) => {
                    drop(sender_guard);
                    self.reject_unspawned(returned)
                }
            };
        }

        drop(sender_guard);
        self.reject(task)
    }

    /// Disposes of the task handed back by a failed [`Self::spawn_worker`].
    fn reject_unspawned(&self, returned: Option<Task>) -> Submission {
        match returned {
            Some(task) => self.reject(task),
            None => {
                warn!("Transmission task lost while spawning a worker");
                self.dropped.fetch_add(1, Ordering::SeqCst);
                Submission::Dropped
            }
        }
    }

    fn reject(&self, task: Task) -> Submission {
        let submission = self.policy.reject(task, self.shared.snapshot());
        if submission == Submission::Dropped {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
        submission
    }

    /// A queued task needs at least one live worker to pick it up.
    fn ensure_worker(&self) {
        let needs_worker = {
            let mut workers = self.shared.lock_workers();
            if *workers == 0 {
                *workers += 1;
                true
            } else {
                false
            }
        };
        if needs_worker {
            // failure is logged; the next submission retries
            let _ = self.spawn_worker(None);
        }
    }

    /// Starts a worker for an already reserved slot. Hands the task back if the thread
    /// could not be created.
    fn spawn_worker(&self, first_task: Option<Task>) -> Result<(), Option<Task>> {
        let shared = Arc::clone(&self.shared);
        let slot = Arc::new(Mutex::new(first_task));
        let worker_slot = Arc::clone(&slot);
        let name = format!(
            "transmit-{}-thread-{}",
            shared.pool_id,
            shared.thread_sequence.fetch_add(1, Ordering::Relaxed)
        );

        let spawned = thread::Builder::new().name(name).spawn(move || {
            let first_task = worker_slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            run_worker(shared, first_task);
        });

        match spawned {
            Ok(_detached) => Ok(()),
            Err(err) => {
                error!("Failed to spawn transmission worker: {err}");
                self.shared.release_worker();
                Err(slot.lock().unwrap_or_else(PoisonError::into_inner).take())
            }
        }
    }

    /// Running plus queued tasks.
    pub fn pending(&self) -> usize {
        let snapshot = self.shared.snapshot();
        snapshot.queued + snapshot.active
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.shared.snapshot()
    }

    pub fn workers(&self) -> usize {
        *self.shared.lock_workers()
    }

    /// Submissions discarded by the drop policy or after shutdown.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Stops accepting work, waits up to `grace` for queued and running tasks, then
    /// discards whatever is still queued. Running tasks cannot be interrupted.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            debug!("Transmission pool already shut down");
        }
        // Workers exit on disconnect once the queue is empty
        drop(sender);

        debug!("Shutting down transmission pool, waiting up to {grace:?}");
        let deadline = Instant::now() + grace;
        let mut workers = self.shared.lock_workers();
        while *workers > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .shared
                .terminated
                .wait_timeout(workers, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            workers = guard;
        }
        let remaining_workers = *workers;
        drop(workers);

        if remaining_workers == 0 {
            debug!("Transmission pool drained");
            return ShutdownReport {
                completed: true,
                abandoned: self.shared.abandoned.load(Ordering::SeqCst),
                in_flight: 0,
            };
        }

        self.shared.cancel.cancel();
        let discarded = self.shared.receiver.try_iter().count();
        let abandoned = self.shared.abandoned.fetch_add(discarded, Ordering::SeqCst) + discarded;
        let in_flight = self.shared.active.load(Ordering::SeqCst);
        warn!(
            "Transmission pool did not drain within {grace:?}: abandoned {abandoned} queued, {in_flight} in flight"
        );
        ShutdownReport {
            completed: false,
            abandoned,
            in_flight,
        }
    }
}
