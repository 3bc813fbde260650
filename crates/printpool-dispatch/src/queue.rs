// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded per-printer job queue.
//
// Jobs sit in a `VecDeque` behind a short-lived `std::sync::Mutex`; the lock
// is never held across an await.  Two `Notify`s wake suspended producers
// (space freed) and consumers (job pushed).  Closing the queue wakes both
// sides: producers give up with `PoolClosed`, consumers keep draining until
// the queue is empty and then see `None`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info, trace};

use printpool_core::error::{PrintpoolError, Result};
use printpool_core::types::PrintJob;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 10;

struct QueueState {
    jobs: VecDeque<PrintJob>,
    closed: bool,
}

/// Bounded FIFO of jobs for one printer.
pub struct PrinterQueue {
    name: String,
    capacity: usize,
    state: Mutex<QueueState>,
    /// Signalled when a job is pushed or the queue closes.
    not_empty: Notify,
    /// Signalled when a job is popped or the queue closes.
    not_full: Notify,
}

impl PrinterQueue {
    /// Create an open, empty queue. A capacity of zero is raised to one.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            state: Mutex::new(QueueState {
                jobs: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of jobs currently waiting.
    pub fn depth(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Append a job without waiting.
    ///
    /// Fails with `QueueFull` at capacity and `PoolClosed` after `close`.
    pub fn try_enqueue(&self, job: PrintJob) -> Result<()> {
        {
            let mut state = self.lock();
            if state.closed {
                return Err(PrintpoolError::PoolClosed);
            }
            if state.jobs.len() >= self.capacity {
                debug!(printer = %self.name, job_id = %job.id, "queue full");
                return Err(PrintpoolError::QueueFull {
                    printer: self.name.clone(),
                });
            }
            trace!(printer = %self.name, job_id = %job.id, "job queued");
            state.jobs.push_back(job);
        }
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append a job, waiting for space if the queue is full.
    ///
    /// Returns `PoolClosed` if the queue is closed before space frees up.
    pub async fn enqueue(&self, job: PrintJob) -> Result<()> {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            // Register before checking so a pop between the check and the
            // await still wakes us.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(PrintpoolError::PoolClosed);
                }
                if state.jobs.len() < self.capacity {
                    trace!(printer = %self.name, job_id = %job.id, "job queued");
                    state.jobs.push_back(job);
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }

            trace!(printer = %self.name, "waiting for queue space");
            notified.await;
        }
    }

    /// Pop the oldest job without waiting.
    pub fn try_dequeue(&self) -> Option<PrintJob> {
        let job = self.lock().jobs.pop_front()?;
        self.not_full.notify_one();
        Some(job)
    }

    /// Pop the oldest job, waiting until one arrives.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn dequeue(&self) -> Option<PrintJob> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(job) = state.jobs.pop_front() {
                    drop(state);
                    self.not_full.notify_one();
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Refuse further enqueues and wake every waiter. Jobs already queued
    /// remain available to `dequeue`. Idempotent.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            info!(printer = %self.name, pending = state.jobs.len(), "queue closed");
        }
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }
}

impl std::fmt::Debug for PrinterQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("PrinterQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("depth", &state.jobs.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use printpool_core::types::{JobId, Token};

    /// Helper: a job for `printer_0` with the given document name.
    fn job(document: &str) -> PrintJob {
        PrintJob::new("printer_0", document, Token::new())
    }

    #[test]
    fn capacity_two_rejects_third_and_keeps_order() {
        let queue = PrinterQueue::new("printer_0", 2);
        let first = job("job_0");
        let second = job("job_1");
        let (first_id, second_id) = (first.id, second.id);

        queue.try_enqueue(first).expect("first fits");
        queue.try_enqueue(second).expect("second fits");
        assert!(matches!(
            queue.try_enqueue(job("job_2")),
            Err(PrintpoolError::QueueFull { .. })
        ));
        assert_eq!(queue.depth(), 2);

        assert_eq!(queue.try_dequeue().map(|j| j.id), Some(first_id));
        assert_eq!(queue.try_dequeue().map(|j| j.id), Some(second_id));
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn rejected_job_does_not_take_a_slot() {
        let queue = PrinterQueue::new("printer_0", 1);
        queue.try_enqueue(job("a")).unwrap();
        assert!(queue.try_enqueue(job("b")).is_err());
        assert!(queue.try_enqueue(job("c")).is_err());

        let popped = queue.try_dequeue().unwrap();
        assert_eq!(popped.document, "a");
        assert!(queue.try_dequeue().is_none());
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = PrinterQueue::new("printer_0", DEFAULT_CAPACITY);
        let ids: Vec<JobId> = (0..DEFAULT_CAPACITY)
            .map(|i| {
                let j = job(&format!("job_{i}"));
                let id = j.id;
                queue.try_enqueue(j).unwrap();
                id
            })
            .collect();

        let mut popped = Vec::new();
        for _ in 0..ids.len() {
            popped.push(queue.dequeue().await.unwrap().id);
        }
        assert_eq!(popped, ids);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let queue = PrinterQueue::new("printer_0", 0);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.try_enqueue(job("a")).is_ok());
    }

    #[test]
    fn enqueue_after_close_is_pool_closed() {
        let queue = PrinterQueue::new("printer_0", 2);
        queue.close();
        assert!(queue.is_closed());
        assert!(matches!(
            queue.try_enqueue(job("late")),
            Err(PrintpoolError::PoolClosed)
        ));
    }

    #[tokio::test]
    async fn dequeue_drains_then_reports_closed() {
        let queue = PrinterQueue::new("printer_0", 2);
        queue.try_enqueue(job("left over")).unwrap();
        queue.close();

        assert_eq!(queue.dequeue().await.unwrap().document, "left over");
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn close_wakes_blocked_dequeuer() {
        let queue = Arc::new(PrinterQueue::new("printer_0", 2));
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("dequeuer woke up")
            .expect("task finished");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn blocking_enqueue_waits_for_space() {
        let queue = Arc::new(PrinterQueue::new("printer_0", 1));
        queue.try_enqueue(job("first")).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.enqueue(job("second")).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        assert_eq!(queue.dequeue().await.unwrap().document, "first");
        tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer woke up")
            .expect("task finished")
            .expect("enqueue succeeded");
        assert_eq!(queue.dequeue().await.unwrap().document, "second");
    }

    #[tokio::test]
    async fn close_releases_blocked_producer() {
        let queue = Arc::new(PrinterQueue::new("printer_0", 1));
        queue.try_enqueue(job("first")).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.enqueue(job("second")).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let result = tokio::time::timeout(Duration::from_secs(1), producer)
            .await
            .expect("producer woke up")
            .expect("task finished");
        assert!(matches!(result, Err(PrintpoolError::PoolClosed)));
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_job_is_dequeued_exactly_once() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 250;

        let queue = Arc::new(PrinterQueue::new("printer_0", 8));

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(job) = queue.dequeue().await {
                        seen.push(job.id);
                    }
                    seen
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut sent = Vec::new();
                    for i in 0..PER_PRODUCER {
                        let j = job(&format!("p{p}-{i}"));
                        sent.push(j.id);
                        queue.enqueue(j).await.expect("queue open");
                    }
                    sent
                })
            })
            .collect();

        let mut sent = HashSet::new();
        for producer in producers {
            sent.extend(producer.await.unwrap());
        }
        queue.close();

        let mut received = Vec::new();
        for consumer in consumers {
            received.extend(consumer.await.unwrap());
        }

        assert_eq!(received.len(), PRODUCERS * PER_PRODUCER);
        let unique: HashSet<_> = received.iter().copied().collect();
        assert_eq!(unique.len(), received.len(), "a job was handed out twice");
        assert_eq!(unique, sent);
    }
}
