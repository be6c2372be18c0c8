//! Bounded Job Pool
//!
//! Runs a caller-supplied kernel over submitted inputs on a fixed set of
//! worker threads and hands completed jobs back in completion order.
//!
//! The caller declares the pool capacity up front: at most `capacity` jobs
//! may be submitted and not yet retrieved. Going past it is a usage error
//! and fails immediately instead of blocking.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A completed unit of work: the input and what the kernel made of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job<I, O> {
    pub input: I,
    pub output: O,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool needs at least one worker and a capacity of at least one (workers {workers}, capacity {capacity})")]
    InvalidConfig { workers: usize, capacity: usize },

    #[error("submitted more jobs than the pool capacity of {capacity}")]
    CapacityExceeded { capacity: usize },

    #[error("no submitted job is left to retrieve")]
    NothingPending,

    #[error("job failed on worker {worker}")]
    Kernel {
        worker: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    #[error("pool aborted after an earlier job failure")]
    Aborted,

    #[error("all pool workers have exited")]
    Disconnected,

    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
}

/// What a worker posts on the completion channel
enum Completion<I, O> {
    Done(Job<I, O>),
    Failed { worker: usize, error: anyhow::Error },
    Panicked { worker: usize, message: String },
}

impl<I, O> Completion<I, O> {
    fn into_result(self) -> Result<Job<I, O>, PoolError> {
        match self {
            Completion::Done(job) => Ok(job),
            Completion::Failed { worker, error } => Err(PoolError::Kernel {
                worker,
                source: error,
            }),
            Completion::Panicked { worker, message } => {
                Err(PoolError::WorkerPanicked { worker, message })
            }
        }
    }
}

type Kernel<I, O> = dyn Fn(&I) -> anyhow::Result<O> + Send + Sync;

/// Worker thread handle
#[derive(Debug)]
struct Worker {
    id: usize,
    handle: JoinHandle<()>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn worker_loop<I, O>(
    id: usize,
    kernel: Arc<Kernel<I, O>>,
    inputs: Receiver<I>,
    completed: Sender<Completion<I, O>>,
    aborted: Arc<AtomicBool>,
) {
    debug!("worker {} started", id);

    for input in inputs.iter() {
        // after a failure, queued inputs are drained without running
        if aborted.load(Ordering::Acquire) {
            continue;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| (*kernel)(&input)));
        let (completion, failed) = match result {
            Ok(Ok(output)) => (Completion::Done(Job { input, output }), false),
            Ok(Err(err)) => {
                error!("worker {}: job failed: {:#}", id, err);
                (Completion::Failed { worker: id, error: err }, true)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("worker {}: job panicked: {}", id, message);
                (Completion::Panicked { worker: id, message }, true)
            }
        };

        // post before raising the flag so a retriever that sees the flag
        // also finds the failure in the channel
        let sent = completed.send(completion).is_ok();
        if failed {
            aborted.store(true, Ordering::Release);
        }
        if !sent {
            warn!("worker {}: pool dropped, exiting early", id);
            break;
        }
    }

    debug!("worker {} exiting", id);
}

/// Fixed-size worker pool with a bounded number of outstanding jobs
pub struct JobPool<I, O> {
    inputs: Option<Sender<I>>,
    completed: Receiver<Completion<I, O>>,
    workers: Vec<Worker>,
    capacity: usize,
    pending: usize,
    aborted: Arc<AtomicBool>,
    // the aborting failure has been handed to the caller
    reported: bool,
}

impl<I, O> JobPool<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Start `workers` threads running `kernel`, accepting at most `capacity`
    /// outstanding jobs.
    pub fn new<K>(kernel: K, workers: usize, capacity: usize) -> Result<Self, PoolError>
    where
        K: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        if workers == 0 || capacity == 0 {
            return Err(PoolError::InvalidConfig { workers, capacity });
        }

        let kernel: Arc<Kernel<I, O>> = Arc::new(kernel);
        let (input_tx, input_rx) = unbounded::<I>();
        let (completed_tx, completed_rx) = bounded::<Completion<I, O>>(capacity);
        let aborted = Arc::new(AtomicBool::new(false));

        let mut pool = Self {
            inputs: Some(input_tx),
            completed: completed_rx,
            workers: Vec::with_capacity(workers),
            capacity,
            pending: 0,
            aborted: aborted.clone(),
            reported: false,
        };

        for id in 0..workers {
            let kernel = kernel.clone();
            let inputs = input_rx.clone();
            let completed = completed_tx.clone();
            let aborted = aborted.clone();

            let handle = thread::Builder::new()
                .name(format!("job-worker-{}", id))
                .spawn(move || worker_loop(id, kernel, inputs, completed, aborted))
                .map_err(PoolError::Spawn)?;

            pool.workers.push(Worker { id, handle });
        }

        debug!("job pool up: {} workers, capacity {}", workers, capacity);
        Ok(pool)
    }
}

impl<I, O> JobPool<I, O> {
    /// Queue one input. Fails without queueing once `capacity` jobs are
    /// outstanding.
    pub fn submit(&mut self, input: I) -> Result<(), PoolError> {
        if self.aborted.load(Ordering::Acquire) {
            return Err(PoolError::Aborted);
        }
        if self.pending >= self.capacity {
            return Err(PoolError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let sender = self.inputs.as_ref().ok_or(PoolError::Disconnected)?;
        sender.send(input).map_err(|_| PoolError::Disconnected)?;
        self.pending += 1;
        Ok(())
    }

    /// Jobs submitted but not yet retrieved
    pub fn pending_count(&self) -> usize {
        self.pending
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Block until some job completes and return it.
    ///
    /// The first kernel failure is returned once; every later call gets
    /// `Aborted`.
    pub fn retrieve(&mut self) -> Result<Job<I, O>, PoolError> {
        if self.reported {
            return Err(PoolError::Aborted);
        }
        if self.pending == 0 {
            return Err(PoolError::NothingPending);
        }

        // a raised flag means the failure is already queued behind any
        // earlier completions
        let completion = self
            .completed
            .recv()
            .map_err(|_| PoolError::Disconnected)?;
        let job = completion.into_result().map_err(|err| {
            // the worker may not have raised the flag yet
            self.aborted.store(true, Ordering::Release);
            self.reported = true;
            err
        })?;
        self.pending -= 1;
        Ok(job)
    }

    /// Stop accepting inputs and wait for every worker to finish what is
    /// queued and exit.
    pub fn close_and_join(mut self) -> Result<(), PoolError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), PoolError> {
        drop(self.inputs.take());

        let mut result = Ok(());
        for worker in self.workers.drain(..) {
            if let Err(payload) = worker.handle.join() {
                result = Err(PoolError::WorkerPanicked {
                    worker: worker.id,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
        result
    }
}

impl<I, O> Drop for JobPool<I, O> {
    fn drop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        if let Err(err) = self.shutdown() {
            warn!("job pool shutdown: {}", err);
        }
    }
}

/// Run every input through `kernel` on a pool sized to the input count.
/// Jobs come back in completion order.
pub fn run_all<I, O, K>(
    kernel: K,
    workers: usize,
    inputs: impl IntoIterator<Item = I>,
) -> Result<Vec<Job<I, O>>, PoolError>
where
    I: Send + 'static,
    O: Send + 'static,
    K: Fn(&I) -> anyhow::Result<O> + Send + Sync + 'static,
{
    let inputs: Vec<I> = inputs.into_iter().collect();
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let count = inputs.len();
    let mut pool = JobPool::new(kernel, workers, count)?;
    for input in inputs {
        pool.submit(input)?;
    }

    let mut jobs = Vec::with_capacity(count);
    while pool.pending_count() > 0 {
        jobs.push(pool.retrieve()?);
    }

    pool.close_and_join()?;
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn identity(x: &u64) -> anyhow::Result<u64> {
        Ok(*x)
    }

    #[test]
    fn test_identity_multiset() {
        let mut pool = JobPool::new(identity, 2, 3).unwrap();
        for x in [7, 7, 9] {
            pool.submit(x).unwrap();
        }
        assert_eq!(pool.pending_count(), 3);

        let mut outputs: Vec<u64> = (0..3).map(|_| pool.retrieve().unwrap().output).collect();
        outputs.sort_unstable();
        assert_eq!(outputs, vec![7, 7, 9]);
        assert_eq!(pool.pending_count(), 0);

        pool.close_and_join().unwrap();
    }

    #[test]
    fn test_capacity_exceeded_fails_fast() {
        let mut pool = JobPool::new(identity, 1, 2).unwrap();
        pool.submit(1).unwrap();
        pool.submit(2).unwrap();

        assert!(matches!(
            pool.submit(3),
            Err(PoolError::CapacityExceeded { capacity: 2 })
        ));
        assert_eq!(pool.pending_count(), 2);

        // retrieving frees a slot
        pool.retrieve().unwrap();
        pool.submit(3).unwrap();
        pool.close_and_join().unwrap();
    }

    #[test]
    fn test_retrieve_without_pending() {
        let mut pool = JobPool::new(identity, 1, 1).unwrap();
        assert!(matches!(pool.retrieve(), Err(PoolError::NothingPending)));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            JobPool::new(identity, 0, 4),
            Err(PoolError::InvalidConfig { workers: 0, .. })
        ));
        assert!(matches!(
            JobPool::new(identity, 4, 0),
            Err(PoolError::InvalidConfig { capacity: 0, .. })
        ));
    }

    #[test]
    fn test_retrieve_blocks_until_done() {
        let slow = |x: &u64| -> anyhow::Result<u64> {
            thread::sleep(Duration::from_millis(20));
            Ok(x * 2)
        };
        let mut pool = JobPool::new(slow, 1, 1).unwrap();
        pool.submit(21).unwrap();

        let job = pool.retrieve().unwrap();
        assert_eq!(job, Job { input: 21, output: 42 });
    }

    #[test]
    fn test_kernel_failure_aborts_pool() {
        let kernel = |x: &u64| -> anyhow::Result<u64> {
            if *x == 3 {
                anyhow::bail!("simulator output did not match");
            }
            thread::sleep(Duration::from_millis(5));
            Ok(*x)
        };
        let mut pool = JobPool::new(kernel, 2, 8).unwrap();
        for x in 0..8 {
            pool.submit(x).unwrap();
        }

        let results: Vec<_> = (0..8).map(|_| pool.retrieve()).collect();
        let first_err = results.iter().position(|r| r.is_err()).unwrap();

        assert!(matches!(
            results[first_err],
            Err(PoolError::Kernel { .. })
        ));
        for later in &results[first_err + 1..] {
            assert!(matches!(later, Err(PoolError::Aborted)));
        }
        assert!(matches!(pool.submit(9), Err(PoolError::Aborted)));

        pool.close_and_join().unwrap();
    }

    #[test]
    fn test_only_first_failure_reported() {
        let kernel = |x: &u64| -> anyhow::Result<u64> { anyhow::bail!("no output for {}", x) };
        let mut pool = JobPool::new(kernel, 2, 4).unwrap();
        for x in 0..4 {
            pool.submit(x).unwrap();
        }
        // let both workers fail before anything is retrieved
        thread::sleep(Duration::from_millis(50));

        assert!(matches!(pool.retrieve(), Err(PoolError::Kernel { .. })));
        assert!(matches!(pool.retrieve(), Err(PoolError::Aborted)));
        assert!(matches!(pool.retrieve(), Err(PoolError::Aborted)));
        assert!(matches!(pool.submit(4), Err(PoolError::Aborted)));

        pool.close_and_join().unwrap();
    }

    #[test]
    fn test_kernel_panic_unblocks_retriever() {
        let kernel = |x: &u64| -> anyhow::Result<u64> {
            if *x == 1 {
                panic!("bad operand");
            }
            Ok(*x)
        };
        let mut pool = JobPool::new(kernel, 1, 2).unwrap();
        pool.submit(1).unwrap();
        pool.submit(2).unwrap();

        match pool.retrieve() {
            Err(PoolError::WorkerPanicked { message, .. }) => assert_eq!(message, "bad operand"),
            other => panic!("unexpected: {:?}", other.map(|j| j.output)),
        }
        pool.close_and_join().unwrap();
    }

    #[test]
    fn test_drop_joins_workers() {
        let mut pool = JobPool::new(identity, 3, 5).unwrap();
        for x in 0..5 {
            pool.submit(x).unwrap();
        }
        drop(pool);
    }

    #[test]
    fn test_run_all() {
        let jobs = run_all(|x: &u64| -> anyhow::Result<u64> { Ok(x + 1) }, 4, 0..100u64).unwrap();
        assert_eq!(jobs.len(), 100);
        for job in &jobs {
            assert_eq!(job.output, job.input + 1);
        }
        assert!(run_all(identity, 4, Vec::<u64>::new()).unwrap().is_empty());
    }
}
