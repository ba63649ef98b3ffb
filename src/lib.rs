pub mod config;
pub mod error;
pub mod handler;
pub mod queue;
pub mod shutdown;
pub mod store;
pub mod worker;

pub use config::QueueConfig;
pub use error::{QueueError, Result};
pub use queue::{Job, JobQueue, JobStatus};
pub use store::JobStore;
pub use worker::WorkerPool;
