// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Worker pool: drains every printer queue with a fixed set of tokio tasks.
//
// # Work discovery
//
// A pool-wide semaphore holds one permit per queued job.  `submit` adds a
// permit after the job is in its queue; a worker takes a permit and then scans
// the printer queues round-robin, starting just after the printer it served
// last, and pops the first job it finds.  The rotating start point keeps one
// busy printer from starving the others.
//
// A permit is not tied to a particular job: two workers can race for the same
// queue, and the loser's scan comes back empty.  Queued jobs never number
// fewer than the permits held by scanning workers, so the loser keeps its
// permit and scans again instead of going back to the semaphore.
//
// # Shutdown
//
// `shutdown` marks the pool closed, closes every queue, and adds one extra
// permit per worker.  Workers keep draining what was already queued; a worker
// stops only when the pool is closed and every queue is empty, which can
// only happen to the holder of one of those extra permits.  `shutdown` then
// joins all workers, so every job accepted before it was called has an
// outcome.
//
// # Per-job flow
//
//   Dequeuing -> Authorizing -> (Printing) -> Idle
//
// Authorization always runs.  An invalid token, a vanished printer, or a
// tripped circuit breaker ends the job without touching the device.  Device
// errors and panics become ERR_GENERAL; the worker moves on to the next job.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use printpool_auth::AuthSession;
use printpool_core::config::PoolConfig;
use printpool_core::error::{PrintpoolError, Result};
use printpool_core::types::{JobId, PrintJob, PrinterResult, Token, WorkerState};

use crate::device::PrintDevice;
use crate::health::{CircuitState, HealthTracker};
use crate::queue::PrinterQueue;
use crate::registry::PrinterRegistry;

/// The recorded result of one dequeued job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub printer: String,
    pub document: String,
    pub token: Token,
    /// Index of the worker that handled the job.
    pub worker: usize,
    pub result: PrinterResult,
    pub finished_at: DateTime<Utc>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the pool handle and its workers.
struct Shared {
    registry: Arc<PrinterRegistry>,
    auth: Arc<AuthSession>,
    device: Arc<dyn PrintDevice>,
    health: Mutex<HealthTracker>,
    /// One permit per queued job, plus one per worker after shutdown.
    available: Semaphore,
    closed: AtomicBool,
    /// Jobs accepted by `submit` that have no outcome yet.
    pending: AtomicUsize,
    /// Signalled when `pending` drops to zero.
    idle: Notify,
    outcomes: Mutex<Vec<JobOutcome>>,
    states: Mutex<Vec<WorkerState>>,
}

impl Shared {
    fn set_state(&self, worker: usize, state: WorkerState) {
        if let Some(slot) = lock(&self.states).get_mut(worker) {
            *slot = state;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn finish_pending(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Pop one job, scanning queues round-robin from `cursor`.
    fn try_take(&self, cursor: &mut usize) -> Option<PrintJob> {
        let queues = self.registry.queues();
        let count = queues.len();
        for offset in 0..count {
            let i = (*cursor + offset) % count;
            if let Some(job) = queues[i].try_dequeue() {
                *cursor = (i + 1) % count;
                return Some(job);
            }
        }
        None
    }

    /// Find the job the caller's permit stands for.
    ///
    /// Returns `None` only once the pool is closed and every queue is empty.
    async fn take_next(&self, cursor: &mut usize) -> Option<PrintJob> {
        loop {
            if let Some(job) = self.try_take(cursor) {
                return Some(job);
            }
            if self.is_closed() && self.registry.total_depth() == 0 {
                return None;
            }
            // Another worker popped the job this scan was heading for.
            tokio::task::yield_now().await;
        }
    }

    /// Ask the circuit breaker whether `printer` may receive a job.
    fn admit(&self, printer: &str) -> std::result::Result<(), CircuitState> {
        let mut health = lock(&self.health);
        if health.allow_request(printer) {
            Ok(())
        } else {
            Err(health.state(printer))
        }
    }

    /// Authorize, print, and record one job.
    async fn process(&self, worker: usize, job: PrintJob) {
        self.set_state(worker, WorkerState::Authorizing);

        let result = if !self.auth.is_valid(job.token) {
            warn!(worker, job_id = %job.id, printer = %job.printer, "token not valid, dropping job");
            PrinterResult::NOT_AUTHORIZED
        } else if self.registry.queue_for(&job.printer).is_err() {
            warn!(worker, job_id = %job.id, printer = %job.printer, "printer no longer registered");
            PrinterResult::PRINTER_NOT_FOUND
        } else if let Err(circuit) = self.admit(&job.printer) {
            debug!(worker, job_id = %job.id, printer = %job.printer, ?circuit, "printer unavailable");
            PrinterResult::NOT_AVAILABLE
        } else {
            self.set_state(worker, WorkerState::Printing);
            let result = self.print(worker, &job).await;
            self.record_health(&job.printer, result);
            result
        };

        debug!(worker, job_id = %job.id, printer = %job.printer, %result, "job finished");
        lock(&self.outcomes).push(JobOutcome {
            job_id: job.id,
            printer: job.printer,
            document: job.document,
            token: job.token,
            worker,
            result,
            finished_at: Utc::now(),
        });
        self.finish_pending();
    }

    /// Run the device call on the blocking pool, containing errors and panics.
    async fn print(&self, worker: usize, job: &PrintJob) -> PrinterResult {
        let device = Arc::clone(&self.device);
        let printer = job.printer.clone();
        let document = job.document.clone();
        let settings = job.settings.clone();
        let token = job.token;

        let call = tokio::task::spawn_blocking(move || {
            device.perform_print(&printer, &document, &settings, &token)
        });

        match call.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(worker, job_id = %job.id, printer = %job.printer, error = %e, "print failed");
                PrinterResult::ERR_GENERAL
            }
            Err(e) => {
                error!(worker, job_id = %job.id, printer = %job.printer, error = %e, "print operation panicked");
                PrinterResult::ERR_GENERAL
            }
        }
    }

    fn record_health(&self, printer: &str, result: PrinterResult) {
        let mut health = lock(&self.health);
        if result.contains(PrinterResult::NOT_AVAILABLE)
            || result.contains(PrinterResult::ERR_GENERAL)
        {
            let streak = health.record_failure(printer);
            debug!(printer, streak, "printer failure recorded");
        } else {
            // Any other answer means the printer is reachable.
            health.record_success(printer);
        }
    }
}

async fn run_worker(shared: Arc<Shared>, worker: usize) {
    let mut cursor = worker;
    debug!(worker, "worker started");

    loop {
        shared.set_state(worker, WorkerState::Idle);
        match shared.available.acquire().await {
            Ok(permit) => permit.forget(),
            // Semaphore closed: the pool was dropped without a shutdown.
            Err(_) => break,
        }

        shared.set_state(worker, WorkerState::Dequeuing);
        match shared.take_next(&mut cursor).await {
            Some(job) => shared.process(worker, job).await,
            None => break,
        }
    }

    shared.set_state(worker, WorkerState::Stopped);
    debug!(worker, "worker stopped");
}

/// Fixed-size pool of dispatch workers over a `PrinterRegistry`.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: usize,
    handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Validate `config` and spawn its workers. Must be called inside a tokio
    /// runtime.
    #[instrument(skip_all, fields(workers = config.workers, printers = registry.len()))]
    pub fn start(
        config: &PoolConfig,
        registry: Arc<PrinterRegistry>,
        auth: Arc<AuthSession>,
        device: Arc<dyn PrintDevice>,
    ) -> Result<Self> {
        config.validate()?;

        let workers = config.workers;
        let shared = Arc::new(Shared {
            registry,
            auth,
            device,
            health: Mutex::new(HealthTracker::new(
                config.failure_threshold,
                config.circuit_cooldown(),
            )),
            available: Semaphore::new(0),
            closed: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
            outcomes: Mutex::new(Vec::new()),
            states: Mutex::new(vec![WorkerState::Idle; workers]),
        });

        let handles = (0..workers)
            .map(|worker| tokio::spawn(run_worker(Arc::clone(&shared), worker)))
            .collect();

        info!(workers, "worker pool started");
        Ok(Self {
            shared,
            workers,
            handles: tokio::sync::Mutex::new(handles),
        })
    }

    fn accept(&self, job: &PrintJob) -> Result<Arc<PrinterQueue>> {
        if self.shared.is_closed() {
            return Err(PrintpoolError::PoolClosed);
        }
        self.shared.registry.queue_for(&job.printer)
    }

    /// Queue `job` without waiting.
    ///
    /// Fails with `PoolClosed` after shutdown, `PrinterNotFound` for an
    /// unregistered printer, and `QueueFull` when the printer's queue is at
    /// capacity. A rejected job is never queued.
    pub fn submit(&self, job: PrintJob) -> Result<()> {
        let queue = self.accept(&job)?;
        let job_id = job.id;

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        match queue.try_enqueue(job) {
            Ok(()) => {
                self.shared.available.add_permits(1);
                debug!(%job_id, printer = queue.name(), "job submitted");
                Ok(())
            }
            Err(e) => {
                self.shared.finish_pending();
                Err(e)
            }
        }
    }

    /// Queue `job`, waiting for space if the printer's queue is full.
    ///
    /// Returns `PoolClosed` if the pool shuts down while waiting.
    pub async fn submit_wait(&self, job: PrintJob) -> Result<()> {
        let queue = self.accept(&job)?;
        let job_id = job.id;

        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        match queue.enqueue(job).await {
            Ok(()) => {
                self.shared.available.add_permits(1);
                debug!(%job_id, printer = queue.name(), "job submitted");
                Ok(())
            }
            Err(e) => {
                self.shared.finish_pending();
                Err(e)
            }
        }
    }

    /// Resolve once every accepted job has an outcome.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.shared.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Close the pool, let workers drain already queued jobs, and wait for
    /// them to stop. Returns every recorded outcome. Safe to call twice.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Vec<JobOutcome> {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            info!(
                queued = self.shared.registry.total_depth(),
                "shutting down worker pool"
            );
            self.shared.registry.close_all();
            self.shared.available.add_permits(self.workers);
        }

        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task ended abnormally");
            }
        }

        let outcomes = self.outcomes();
        info!(outcomes = outcomes.len(), "worker pool stopped");
        outcomes
    }

    /// Snapshot of the outcomes recorded so far.
    pub fn outcomes(&self) -> Vec<JobOutcome> {
        lock(&self.shared.outcomes).clone()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        lock(&self.shared.states).clone()
    }

    /// Accepted jobs still waiting for an outcome.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn registry(&self) -> &Arc<PrinterRegistry> {
        &self.shared.registry
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Without a shutdown, workers would wait on the semaphore forever.
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.available.close();
    }
}
