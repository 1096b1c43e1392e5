use super::{
    errors::{JobError, JobResult, PoolError},
    handle::{JobHandle, ResultStream},
    job::Job,
    model::PoolMetrics,
    worker::Worker,
};
use crossbeam::channel::{self, Receiver, Sender};
use std::{
    sync::{
        atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
};
use tokio::sync::{mpsc, oneshot};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: usize,
    /// Worker threads are named `<prefix>-<id>`.
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
            thread_name_prefix: "dynpool-worker".to_string(),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self::default()
    }

    /// Twice as many workers as CPUs, for jobs that mostly wait on I/O.
    pub fn io_bound() -> Self {
        Self {
            num_workers: num_cpus::get() * 2,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }
}

type BoxedFn<In, Out, E> = Box<dyn Fn(In) -> Result<Out, E> + Send + Sync + 'static>;

/// State read by every worker.
pub(crate) struct Shared<In, Out, E> {
    pub(crate) function: BoxedFn<In, Out, E>,
    pub(crate) intake: Receiver<Job<In, Out, E>>,
    pub(crate) queued: AtomicI64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) panicked: AtomicU64,
}

/// A resizable set of worker threads running one function over submitted inputs.
///
/// Submissions hand jobs directly to an idle worker: there is no queue buffer,
/// so a submitting thread blocks until some worker is free to take its job.
/// Jobs submitted while the pool has no workers block until it is grown again.
///
/// Dropping the pool stops and joins every worker.
pub struct Pool<In, Out, E> {
    shared: Arc<Shared<In, Out, E>>,
    intake: Sender<Job<In, Out, E>>,
    workers: Mutex<Vec<Worker>>,
    next_worker_id: AtomicUsize,
    config: Config,
}

impl<In, Out, E> Pool<In, Out, E>
where
    In: Send + 'static,
    Out: Send + 'static,
    E: Send + 'static,
{
    pub fn new<F>(size: usize, function: F) -> Result<Self, PoolError>
    where
        F: Fn(In) -> Result<Out, E> + Send + Sync + 'static,
    {
        Self::with_config(Config::default().with_workers(size), function)
    }

    pub fn with_config<F>(config: Config, function: F) -> Result<Self, PoolError>
    where
        F: Fn(In) -> Result<Out, E> + Send + Sync + 'static,
    {
        let (intake, receiver) = channel::bounded(0);
        let shared = Arc::new(Shared {
            function: Box::new(function),
            intake: receiver,
            queued: AtomicI64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let pool = Pool {
            shared,
            intake,
            workers: Mutex::new(Vec::with_capacity(config.num_workers)),
            next_worker_id: AtomicUsize::new(0),
            config,
        };
        pool.set_size(pool.config.num_workers)?;
        log::info!(
            "pool created with {} workers ({})",
            pool.config.num_workers,
            pool.config.thread_name_prefix
        );
        Ok(pool)
    }

    /// Grows or shrinks the pool to `n` workers.
    ///
    /// Shrinking waits for every removed worker to exit. A removed worker that
    /// is running a job finishes it first. Submissions are not blocked by a
    /// resize in progress.
    ///
    /// If a worker thread cannot be spawned, the workers started so far are
    /// kept and the error is returned.
    pub fn set_size(&self, n: usize) -> Result<(), PoolError> {
        let mut workers = self.lock_workers();
        let current = workers.len();

        if n > current {
            workers.reserve(n - current);
            for _ in current..n {
                workers.push(self.spawn_worker()?);
            }
        } else if n < current {
            for worker in workers[n..].iter_mut() {
                worker.stop();
            }
            for worker in workers[n..].iter_mut() {
                worker.join();
            }
            workers.truncate(n);
        }

        if n != current {
            log::info!("pool resized from {} to {} workers", current, n);
        }
        Ok(())
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.lock_workers().len()
    }

    /// Jobs submitted whose result has not been delivered yet.
    #[inline]
    pub fn queued_jobs(&self) -> i64 {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Stops and joins every worker. Safe to call more than once.
    pub fn close(&self) {
        // shrinking never spawns, so it cannot fail
        let _ = self.set_size(0);
    }

    /// Runs `input` on a worker and blocks until its result is delivered.
    ///
    /// Must not be called from within an async runtime; use
    /// [`Pool::execute_async`] and await the handle there.
    pub fn execute(&self, input: In) -> JobResult<Out, E> {
        self.execute_async(input).wait()
    }

    /// Hands `input` to a worker and returns without waiting for the result.
    ///
    /// Like every submission this blocks until a worker accepts the job.
    pub fn execute_async(&self, input: In) -> JobHandle<Out, E> {
        let (tx, rx) = oneshot::channel();
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        self.push(Job::single(input, tx));
        JobHandle::new(rx)
    }

    /// Submits every input and returns a stream of their results.
    ///
    /// Results arrive in completion order, not submission order. The stream
    /// ends after the last result.
    pub fn execute_batch<I>(&self, inputs: I) -> ResultStream<Out, E>
    where
        I: IntoIterator<Item = In>,
    {
        let inputs: Vec<In> = inputs.into_iter().collect();
        let len = inputs.len();
        // room for every result, so workers never wait on a slow consumer
        let (tx, rx) = mpsc::channel(len.max(1));
        let remaining = Arc::new(AtomicUsize::new(len));

        self.shared.queued.fetch_add(len as i64, Ordering::AcqRel);
        for input in inputs {
            self.push(Job::batched(input, tx.clone(), remaining.clone()));
        }

        ResultStream::new(rx, remaining, len)
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            workers: self.size(),
            queued_jobs: self.queued_jobs(),
            completed_jobs: self.shared.completed.load(Ordering::Relaxed),
            failed_jobs: self.shared.failed.load(Ordering::Relaxed),
            panicked_jobs: self.shared.panicked.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn push(&self, job: Job<In, Out, E>) {
        if let Err(channel::SendError(job)) = self.intake.send(job) {
            // unreachable while `shared` holds the receiving half
            log::error!("pool intake disconnected, dropping job");
            self.shared.queued.fetch_sub(1, Ordering::AcqRel);
            let (_, slot) = job.into_parts();
            slot.deliver(Err(JobError::PoolClosed));
        }
    }

    fn spawn_worker(&self) -> Result<Worker, PoolError> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.thread_name_prefix, id));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        Ok(Worker::spawn(id, self.shared.clone(), builder)?)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<In, Out, E> Drop for Pool<In, Out, E> {
    fn drop(&mut self) {
        let workers = self.workers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for worker in workers.iter_mut() {
            worker.stop();
        }
        // each worker joins on drop
        workers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn doubler(size: usize) -> Pool<i32, i32, String> {
        Pool::new(size, |x: i32| Ok(x * 2)).unwrap()
    }

    #[test]
    fn config_presets() {
        let cpus = num_cpus::get();
        assert_eq!(Config::default().num_workers, cpus);
        assert_eq!(Config::cpu_bound().num_workers, cpus);
        assert_eq!(Config::io_bound().num_workers, cpus * 2);
        assert_eq!(Config::default().with_workers(3).num_workers, 3);
    }

    #[test]
    fn worker_threads_are_named() {
        let config = Config {
            num_workers: 1,
            thread_name_prefix: "named".to_string(),
            stack_size: Some(256 * 1024),
        };
        let pool: Pool<(), String, String> = Pool::with_config(config, |_: ()| {
            Ok(thread::current().name().unwrap_or_default().to_string())
        })
        .unwrap();
        assert_eq!(pool.execute(()).unwrap(), "named-0");

        pool.set_size(0).unwrap();
        pool.set_size(1).unwrap();
        assert_eq!(pool.execute(()).unwrap(), "named-1");
    }

    #[test]
    fn shrink_waits_for_running_job() {
        let pool: Pool<u64, u64, String> = Pool::new(1, |ms: u64| {
            thread::sleep(Duration::from_millis(ms));
            Ok(ms)
        })
        .unwrap();

        let handle = pool.execute_async(100);
        pool.set_size(0).unwrap();
        assert_eq!(pool.size(), 0);
        assert_eq!(handle.wait().unwrap(), 100);
        assert_eq!(pool.queued_jobs(), 0);
    }

    #[test]
    fn metrics_track_outcomes() {
        let pool: Pool<i32, i32, String> = Pool::new(2, |x: i32| match x {
            0 => Err("zero".to_string()),
            x if x < 0 => panic!("negative input"),
            x => Ok(x),
        })
        .unwrap();

        assert!(pool.execute(1).is_ok());
        assert!(matches!(pool.execute(0), Err(JobError::Failed(ref e)) if e == "zero"));
        assert!(matches!(pool.execute(-1), Err(JobError::Panic(_))));

        let metrics = pool.metrics();
        assert_eq!(metrics.workers, 2);
        assert_eq!(metrics.queued_jobs, 0);
        assert_eq!(metrics.completed_jobs, 1);
        assert_eq!(metrics.failed_jobs, 1);
        assert_eq!(metrics.panicked_jobs, 1);
    }

    #[test]
    fn empty_batch_is_closed_immediately() {
        let pool = doubler(2);
        let stream = pool.execute_batch(Vec::new());
        assert!(stream.is_empty());
        assert_eq!(stream.pending(), 0);
        assert!(stream.collect_all().is_empty());
        assert_eq!(pool.queued_jobs(), 0);
    }

    #[test]
    fn drop_joins_workers() {
        let pool = doubler(4);
        assert_eq!(pool.execute(4).unwrap(), 8);
        drop(pool);
    }
}
