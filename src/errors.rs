use std::io;

/// Outcome of one job: the user function's output, or why there is none.
pub type JobResult<Out, E> = Result<Out, JobError<E>>;

#[derive(Debug, thiserror::Error)]
pub enum JobError<E> {
    /// The user function returned an error. Passed through untouched.
    #[error("{0}")]
    Failed(E),
    /// The user function panicked. The worker survived.
    #[error("job panicked: {0}")]
    Panic(String),
    #[error("the pool was closed")]
    PoolClosed,
}

impl<E> JobError<E> {
    /// Returns the user function's error, if that is what this is.
    pub fn into_failed(self) -> Option<E> {
        match self {
            JobError::Failed(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn is_panic(&self) -> bool {
        matches!(self, JobError::Panic(_))
    }

    #[inline]
    pub fn is_pool_closed(&self) -> bool {
        matches!(self, JobError::PoolClosed)
    }
}

/// Lifecycle errors of the pool itself.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}
