use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{HandlerError, JobHandler};

/// Text scanning: reads `payload.filename` and counts non-overlapping
/// occurrences of each string in `payload.patterns`.
pub struct AnalyzeHandler;

#[async_trait]
impl JobHandler for AnalyzeHandler {
    async fn execute(&self, payload: &Value) -> Result<Value, HandlerError> {
        let filename = payload
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                HandlerError::InvalidPayload("missing filename in payload".to_string())
            })?;

        let patterns: Vec<&str> = match payload.get("patterns") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().ok_or_else(|| {
                        HandlerError::InvalidPayload("patterns must be strings".to_string())
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(HandlerError::InvalidPayload(
                    "patterns must be an array".to_string(),
                ))
            }
        };

        let text = tokio::fs::read_to_string(filename).await?;

        let mut counts = Map::new();
        for pattern in patterns {
            counts.insert(pattern.to_string(), json!(text.matches(pattern).count()));
        }
        Ok(json!({ "counts": counts }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_filename_is_invalid() {
        let err = AnalyzeHandler.execute(&json!({})).await.unwrap_err();
        match err {
            HandlerError::InvalidPayload(detail) => assert!(detail.contains("filename")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn counts_patterns_in_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "the cat sat on the mat").unwrap();

        let payload = json!({
            "filename": file.path(),
            "patterns": ["the", "at", "dog"],
        });
        let result = AnalyzeHandler.execute(&payload).await.unwrap();
        assert_eq!(result, json!({"counts": {"the": 2, "at": 3, "dog": 0}}));
    }

    #[tokio::test]
    async fn no_patterns_yields_empty_counts() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let payload = json!({"filename": file.path()});
        let result = AnalyzeHandler.execute(&payload).await.unwrap();
        assert_eq!(result, json!({"counts": {}}));
    }

    #[tokio::test]
    async fn unreadable_file_is_io_error() {
        let payload = json!({"filename": "/nonexistent/path/report.txt", "patterns": ["x"]});
        let err = AnalyzeHandler.execute(&payload).await.unwrap_err();
        assert!(matches!(err, HandlerError::Io(_)));
    }
}
