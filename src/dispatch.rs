//! Execution contexts for callback dispatch.
//!
//! An [`ExecutionContext`] decides *where* a registered callback runs once
//! an outcome is dispatched. Dispatch itself never invokes user code
//! inline: the completion thread (a service-call task or the timeout
//! timer) only schedules the handler onto its bound context and moves on.
//!
//! Two targets are provided:
//!
//! - [`ExecutionContext::Concurrent`] - each job is spawned onto the
//!   ambient tokio runtime; no ordering guarantee between jobs.
//! - [`ExecutionContext::Serial`] - jobs are funneled through a
//!   [`SerialQueue`], a dedicated drain task that runs them one at a
//!   time in submission order.
//!
//! # Architecture
//!
//! ```text
//! dispatch ─┬─► Concurrent ──► tokio::spawn (unordered)
//!           └─► Serial ──► mpsc::UnboundedSender ──► drain task (FIFO)
//! ```

use tokio::sync::mpsc;

/// A unit of work scheduled onto an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An order-preserving dispatch target.
///
/// Cheaply cloneable handle over an unbounded channel; a dedicated task
/// drains jobs one at a time, so two jobs submitted to the same queue
/// observe submission order. The drain task exits when the last handle
/// is dropped.
#[derive(Debug, Clone)]
pub struct SerialQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Create a serial queue and spawn its drain task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job();
            }
            tracing::debug!("Serial queue closed, drain task exiting");
        });

        Self { tx }
    }

    /// Submit a job to the back of the queue.
    pub fn schedule(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("Serial queue task is gone, dropping job");
        }
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a logical execution context to an asynchronous dispatch target.
///
/// Used only to decide where a callback runs; carries no other state.
#[derive(Debug, Clone, Default)]
pub enum ExecutionContext {
    /// Spawn each job onto the tokio runtime. Jobs may run concurrently
    /// with no ordering guarantee.
    #[default]
    Concurrent,

    /// Route jobs through a serial queue that preserves submission order.
    Serial(SerialQueue),
}

impl ExecutionContext {
    /// Convenience constructor for a fresh serial context.
    pub fn serial() -> Self {
        Self::Serial(SerialQueue::new())
    }

    /// Schedule a job on this context.
    ///
    /// Returns without waiting for the job to run.
    pub fn schedule(&self, job: Job) {
        match self {
            Self::Concurrent => {
                tokio::spawn(async move { job() });
            }
            Self::Serial(queue) => queue.schedule(job),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_runs_job() {
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = ExecutionContext::Concurrent;

        let c = counter.clone();
        ctx.schedule(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_serial_preserves_submission_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let queue = SerialQueue::new();

        for i in 0..10 {
            let order = order.clone();
            queue.schedule(Box::new(move || {
                order.lock().push(i);
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*order.lock(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_serial_clone_shares_queue() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let queue = SerialQueue::new();
        let queue2 = queue.clone();

        let o1 = order.clone();
        queue.schedule(Box::new(move || o1.lock().push(1)));
        let o2 = order.clone();
        queue2.schedule(Box::new(move || o2.lock().push(2)));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_schedule_returns_before_job_runs() {
        // A job that blocks on a channel must not block schedule().
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let queue = SerialQueue::new();

        queue.schedule(Box::new(move || {
            let _ = rx.recv();
        }));

        // If schedule() were synchronous this would deadlock.
        tx.send(()).unwrap();
    }
}
