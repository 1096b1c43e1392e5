//! A resizable pool of worker threads that run one function over many inputs.
//!
//! # Features
//! - Grow or shrink the worker set while jobs are running
//! - Graceful shrink: removed workers finish their current job before exiting
//! - Blocking, async (`Future`) and batch (`Iterator` / `Stream`) submission
//! - Rendezvous hand-off: submitters block until a worker is free
//! - Panics inside the user function are caught and reported per job
//! - Lock-free accounting of jobs in flight

pub mod errors;
pub mod handle;
mod job;
pub mod model;
pub mod pool;
mod worker;

pub use errors::{JobError, JobResult, PoolError};
pub use handle::{JobHandle, ResultStream};
pub use model::PoolMetrics;
pub use pool::{Config, Pool};
