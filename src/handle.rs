use super::errors::{JobError, JobResult};
use futures::Stream;
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};
use tokio::sync::{mpsc, oneshot};

/// Handle to a single submitted job.
///
/// Await it from async code, or call [`JobHandle::wait`] from a plain thread.
/// If the job is dropped before it runs, the handle resolves to
/// [`JobError::PoolClosed`].
pub struct JobHandle<Out, E> {
    receiver: oneshot::Receiver<JobResult<Out, E>>,
}

impl<Out, E> JobHandle<Out, E> {
    pub(crate) fn new(receiver: oneshot::Receiver<JobResult<Out, E>>) -> Self {
        Self { receiver }
    }

    /// Blocks the current thread until the job's result is delivered.
    ///
    /// Panics when called from within an async runtime; await the handle there.
    pub fn wait(self) -> JobResult<Out, E> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(JobError::PoolClosed))
    }

    /// Returns the result if it has already been delivered.
    pub fn try_result(&mut self) -> Option<JobResult<Out, E>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(JobError::PoolClosed)),
        }
    }
}

impl<Out, E> Future for JobHandle<Out, E> {
    type Output = JobResult<Out, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(JobError::PoolClosed))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Results of a batch submission, in completion order.
///
/// The stream ends once every job of the batch has delivered its result. If
/// the pool is shut down under a batch, it may end early with fewer results.
pub struct ResultStream<Out, E> {
    receiver: mpsc::Receiver<JobResult<Out, E>>,
    remaining: Arc<AtomicUsize>,
    len: usize,
}

impl<Out, E> ResultStream<Out, E> {
    pub(crate) fn new(
        receiver: mpsc::Receiver<JobResult<Out, E>>,
        remaining: Arc<AtomicUsize>,
        len: usize,
    ) -> Self {
        Self {
            receiver,
            remaining,
            len,
        }
    }

    /// Number of jobs submitted in this batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Jobs of this batch whose result has not been delivered yet.
    #[inline]
    pub fn pending(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Blocks until the next result, or `None` once the batch is exhausted.
    ///
    /// Panics when called from within an async runtime; use the `Stream` impl there.
    pub fn recv(&mut self) -> Option<JobResult<Out, E>> {
        self.receiver.blocking_recv()
    }

    /// Drains the whole batch, blocking the current thread.
    pub fn collect_all(self) -> Vec<JobResult<Out, E>> {
        let len = self.len;
        let mut results = Vec::with_capacity(len);
        results.extend(self);
        results
    }
}

impl<Out, E> IntoIterator for ResultStream<Out, E> {
    type Item = JobResult<Out, E>;
    type IntoIter = IntoIter<Out, E>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter(self)
    }
}

/// Blocking iterator over a batch's results.
pub struct IntoIter<Out, E>(ResultStream<Out, E>);

impl<Out, E> IntoIter<Out, E> {
    #[inline]
    pub fn pending(&self) -> usize {
        self.0.pending()
    }
}

impl<Out, E> Iterator for IntoIter<Out, E> {
    type Item = JobResult<Out, E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.recv()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.0.len))
    }
}

impl<Out, E> Stream for ResultStream<Out, E> {
    type Item = JobResult<Out, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
