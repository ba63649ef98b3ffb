pub mod job;
pub mod service;

pub use job::{Job, JobStatus};
pub use service::JobQueue;
