// Copyright 2026 the Fresco Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size worker pool.

use std::thread::JoinHandle;

use crossbeam_channel::{Sender, unbounded};

type Job = Box<dyn FnOnce() + Send>;

/// A fixed set of threads consuming jobs from a shared channel.
///
/// Dropping the pool closes the channel and joins every thread after the
/// queued jobs have run.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` worker threads (at least one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size.max(1));
        for i in 0..size.max(1) {
            let receiver = receiver.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("fresco-worker-{i}"))
                .spawn(move || {
                    for job in receiver {
                        job();
                    }
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => log::error!("Failed to spawn redraw worker {i}: {e}"),
            }
        }
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Number of live worker threads.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queues `job`. Runs it on the calling thread if no worker could be
    /// started.
    pub fn execute<F: FnOnce() + Send + 'static>(&self, job: F) {
        if self.workers.is_empty() {
            job();
            return;
        }
        if let Some(sender) = &self.sender {
            if let Err(e) = sender.send(Box::new(job)) {
                (e.into_inner())();
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Redraw worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn runs_every_job_before_drop_returns() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(3);
            assert_eq!(pool.size(), 3);
            for _ in 0..50 {
                let c = Arc::clone(&count);
                pool.execute(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(count.load(Ordering::SeqCst), 50, "drop drains the queue");
    }

    #[test]
    fn zero_size_gets_one_worker() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn jobs_run_off_the_calling_thread() {
        let caller = std::thread::current().id();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let pool = WorkerPool::new(1);
        pool.execute(move || {
            _ = tx.send(std::thread::current().id());
        });
        assert_ne!(rx.recv().unwrap(), caller);
    }
}
