use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The submission was malformed (missing or empty job type).
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// A freshly generated job id collided with an existing row. This points
    /// at an id-generation defect and is never swallowed.
    #[error("Job id conflict: {0}")]
    Conflict(String),

    /// An unrecognized status string was supplied (e.g. in a list filter).
    #[error("Unknown job status: {0}")]
    InvalidStatus(String),

    /// A stored row could not be decoded back into a job.
    #[error("Corrupt job record: {0}")]
    Corrupt(String),

    /// The backing store rejected or could not serve a request.
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;
