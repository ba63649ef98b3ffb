use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{HandlerError, JobHandler};

/// Delay simulation: sleeps for `payload.seconds` (default 1) and reports
/// how long it slept.
pub struct SleepHandler;

#[async_trait]
impl JobHandler for SleepHandler {
    async fn execute(&self, payload: &Value) -> Result<Value, HandlerError> {
        let seconds_value = payload.get("seconds").cloned().unwrap_or_else(|| json!(1));
        let seconds = seconds_value.as_f64().ok_or_else(|| {
            HandlerError::InvalidPayload("seconds must be a number".to_string())
        })?;

        // Rejects negative, NaN, infinite, and values beyond the Duration
        // range; a conversion panic here would wedge the job mid-claim.
        let delay = Duration::try_from_secs_f64(seconds)
            .map_err(|e| HandlerError::InvalidPayload(format!("bad seconds value: {e}")))?;

        tokio::time::sleep(delay).await;
        Ok(json!({ "slept": seconds_value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sleep_zero_reports_zero() {
        let result = SleepHandler.execute(&json!({"seconds": 0})).await.unwrap();
        assert_eq!(result, json!({"slept": 0}));
    }

    #[tokio::test]
    async fn fractional_seconds_are_echoed() {
        let result = SleepHandler
            .execute(&json!({"seconds": 0.01}))
            .await
            .unwrap();
        assert_eq!(result, json!({"slept": 0.01}));
    }

    #[tokio::test]
    async fn non_numeric_seconds_is_invalid() {
        let err = SleepHandler
            .execute(&json!({"seconds": "soon"}))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn negative_seconds_is_invalid() {
        let err = SleepHandler
            .execute(&json!({"seconds": -1}))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn oversized_seconds_is_invalid_not_a_panic() {
        let err = SleepHandler
            .execute(&json!({"seconds": 1e30}))
            .await
            .unwrap_err();
        match err {
            HandlerError::InvalidPayload(detail) => assert!(detail.contains("seconds")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn nan_seconds_is_invalid() {
        // f64::NAN is not representable in JSON; a null slips through as
        // "not a number" instead.
        let err = SleepHandler
            .execute(&json!({"seconds": null}))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }
}
