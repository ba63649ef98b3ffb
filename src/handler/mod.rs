//! Job-type handlers.
//!
//! A handler is the behavior a job type names: `execute(payload) -> result`.
//! The registry maps type names to handlers and resolves unknown names to an
//! explicit fallback that succeeds with a "not implemented" note, so
//! unrecognized types drain from the queue instead of clogging it.

pub mod analyze;
pub mod sleep;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

pub use analyze::AnalyzeHandler;
pub use sleep::SleepHandler;

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, payload: &Value) -> Result<Value, HandlerError>;
}

/// Succeeds for any payload, reporting that the type has no real handler.
struct NotImplemented {
    job_type: String,
}

#[async_trait]
impl JobHandler for NotImplemented {
    async fn execute(&self, _payload: &Value) -> Result<Value, HandlerError> {
        Ok(json!({
            "info": format!("job type not implemented: {}", self.job_type)
        }))
    }
}

pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in `sleep` and `analyze` handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("sleep", Arc::new(SleepHandler));
        registry.register("analyze", Arc::new(AnalyzeHandler));
        registry
    }

    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    /// Resolve a type name to its handler; unknown names get the
    /// not-implemented fallback rather than an error.
    pub fn resolve(&self, job_type: &str) -> Arc<dyn JobHandler> {
        match self.handlers.get(job_type) {
            Some(handler) => Arc::clone(handler),
            None => Arc::new(NotImplemented {
                job_type: job_type.to_string(),
            }),
        }
    }
}
