use std::time::Duration;

/// Configuration for the queue daemon: where jobs are stored and how the
/// worker pool polls, retries, and bounds concurrency.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// SQLite database URL shared by all coordinator processes.
    pub database_url: String,

    /// Maximum number of jobs executing concurrently; also the number of
    /// candidates claimed per poll cycle.
    pub max_concurrency: usize,

    /// Number of automatic retries after the first failed attempt. A job is
    /// executed at most `retry_limit + 1` times.
    pub retry_limit: u32,

    /// Delay between poll cycles.
    pub poll_interval: Duration,

    /// Fixed delay before a failed job is re-queued for another attempt.
    pub retry_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:jobs.db?mode=rwc".to_string(),
            max_concurrency: 3,
            retry_limit: 1,
            poll_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(2),
        }
    }
}

impl QueueConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.database_url, "sqlite:jobs.db?mode=rwc");
        assert_eq!(cfg.max_concurrency, 3);
        assert_eq!(cfg.retry_limit, 1);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.retry_backoff, Duration::from_secs(2));
    }

    #[test]
    fn config_new_keeps_defaults() {
        let cfg = QueueConfig::new("sqlite::memory:");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.max_concurrency, 3);
        assert_eq!(cfg.retry_limit, 1);
    }

    #[test]
    fn config_builders() {
        let cfg = QueueConfig::new("sqlite::memory:")
            .with_max_concurrency(8)
            .with_retry_limit(3)
            .with_poll_interval(Duration::from_millis(50))
            .with_retry_backoff(Duration::from_millis(10));
        assert_eq!(cfg.max_concurrency, 8);
        assert_eq!(cfg.retry_limit, 3);
        assert_eq!(cfg.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.retry_backoff, Duration::from_millis(10));
    }
}
