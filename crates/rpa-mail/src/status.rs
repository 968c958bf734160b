//! Outcome records handed back to the orchestration layer.
//!
//! A [`Status`] says whether an operation succeeded and, if not, whether the
//! orchestrator should try again. The decision to retry stays with the
//! caller; this module only classifies.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StatusError;

/// Delay suggested to the orchestrator before a retryable failure is retried.
pub const RETRY_DELAY_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusErrorType {
    Retryable,
    NonRetryable,
    Unknown,
}

impl StatusErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusErrorType::Retryable => "retryable",
            StatusErrorType::NonRetryable => "nonretryable",
            StatusErrorType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusErrorType {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "retryable" => Ok(StatusErrorType::Retryable),
            "nonretryable" => Ok(StatusErrorType::NonRetryable),
            "unknown" => Ok(StatusErrorType::Unknown),
            _ => Err(StatusError::InvalidErrorType(s.to_string())),
        }
    }
}

/// Inputs for [`Status::create`].
#[derive(Debug, Clone, Default)]
pub struct StatusParams {
    pub is_success: bool,
    pub error_message: Option<String>,
    /// Matched case-insensitively against the [`StatusErrorType`] names.
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub details: Option<serde_json::Map<String, Value>>,
    pub retry_after: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub exception_type: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub is_success: bool,
    pub error_message: Option<String>,
    pub error_type: Option<StatusErrorType>,
    pub code: Option<String>,
    pub details: serde_json::Map<String, Value>,
    pub retry_after: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub exception_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

impl Status {
    /// Builds a status from raw parameters, validating `error_type`.
    ///
    /// An empty `error_type` is treated as absent.
    pub fn create(params: StatusParams) -> Result<Self, StatusError> {
        let error_type = match params.error_type.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<StatusErrorType>()?),
        };

        Ok(Self {
            is_success: params.is_success,
            error_message: params.error_message,
            error_type,
            code: params.code,
            details: params.details.unwrap_or_default(),
            retry_after: params.retry_after,
            source: params.source,
            exception_type: params.exception_type,
            timestamp: Utc::now(),
            duration_ms: params.duration_ms,
        })
    }

    pub fn success(
        code: Option<String>,
        details: Option<serde_json::Map<String, Value>>,
        duration_ms: u64,
    ) -> Self {
        Self::failure_free(code, details.unwrap_or_default(), duration_ms)
    }

    /// A failure the orchestrator may retry after [`RETRY_DELAY_SECS`].
    pub fn retryable(error_message: impl Into<String>, exception_type: Option<String>) -> Self {
        let mut status = Self::failed(
            error_message.into(),
            StatusErrorType::Retryable,
            exception_type,
        );
        status.retry_after = Some(status.timestamp + Duration::seconds(RETRY_DELAY_SECS));
        status
    }

    pub fn non_retryable(error_message: impl Into<String>, exception_type: Option<String>) -> Self {
        Self::failed(
            error_message.into(),
            StatusErrorType::NonRetryable,
            exception_type,
        )
    }

    pub fn retryable_from_error<E: std::error::Error>(err: &E) -> Self {
        Self::retryable(err.to_string(), Some(std::any::type_name::<E>().to_string()))
    }

    pub fn non_retryable_from_error<E: std::error::Error>(err: &E) -> Self {
        Self::non_retryable(err.to_string(), Some(std::any::type_name::<E>().to_string()))
    }

    /// Sets the component that produced this status.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn to_json(&self, indented: bool) -> serde_json::Result<String> {
        if indented {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    fn failure_free(
        code: Option<String>,
        details: serde_json::Map<String, Value>,
        duration_ms: u64,
    ) -> Self {
        Self {
            is_success: true,
            error_message: None,
            error_type: None,
            code,
            details,
            retry_after: None,
            source: None,
            exception_type: None,
            timestamp: Utc::now(),
            duration_ms,
        }
    }

    fn failed(
        error_message: String,
        error_type: StatusErrorType,
        exception_type: Option<String>,
    ) -> Self {
        Self {
            is_success: false,
            error_message: Some(error_message),
            error_type: Some(error_type),
            code: None,
            details: serde_json::Map::new(),
            retry_after: None,
            source: None,
            exception_type,
            timestamp: Utc::now(),
            duration_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success() {
        let mut details = serde_json::Map::new();
        details.insert("mails".to_string(), json!(3));

        let status = Status::success(Some("OK".to_string()), Some(details), 120);
        assert!(status.is_success);
        assert_eq!(status.code.as_deref(), Some("OK"));
        assert_eq!(status.details["mails"], json!(3));
        assert_eq!(status.duration_ms, 120);
        assert!(status.error_message.is_none());
        assert!(status.error_type.is_none());
        assert!(status.retry_after.is_none());
        assert!(status.exception_type.is_none());
    }

    #[test]
    fn test_success_defaults_to_empty_details() {
        let status = Status::success(None, None, 0);
        assert!(status.details.is_empty());
    }

    #[test]
    fn test_retryable() {
        let status = Status::retryable("timeout", Some("IOException".to_string()));
        assert!(!status.is_success);
        assert_eq!(status.error_type, Some(StatusErrorType::Retryable));
        assert_eq!(status.error_message.as_deref(), Some("timeout"));
        assert_eq!(status.exception_type.as_deref(), Some("IOException"));

        let retry_after = status.retry_after.unwrap();
        assert_eq!(
            (retry_after - status.timestamp).num_seconds(),
            RETRY_DELAY_SECS
        );
    }

    #[test]
    fn test_non_retryable_has_no_retry_after() {
        let status = Status::non_retryable("bad input", None);
        assert!(!status.is_success);
        assert_eq!(status.error_type, Some(StatusErrorType::NonRetryable));
        assert!(status.retry_after.is_none());
    }

    #[test]
    fn test_from_error_records_type_name() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "socket timed out");
        let status = Status::retryable_from_error(&err);
        assert_eq!(status.error_message.as_deref(), Some("socket timed out"));
        let exception_type = status.exception_type.unwrap();
        assert!(exception_type.starts_with("std::io::"));
        assert!(exception_type.ends_with("Error"));

        let status = Status::non_retryable_from_error(&StatusError::InvalidErrorType("x".into()));
        assert!(status
            .exception_type
            .as_deref()
            .unwrap()
            .ends_with("StatusError"));
    }

    #[test]
    fn test_create_validates_error_type() {
        let status = Status::create(StatusParams {
            error_type: Some("NONRETRYABLE".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(status.error_type, Some(StatusErrorType::NonRetryable));

        let status = Status::create(StatusParams {
            error_type: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(status.error_type, None);

        let result = Status::create(StatusParams {
            error_type: Some("fatal".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(StatusError::InvalidErrorType(t)) if t == "fatal"));
    }

    #[test]
    fn test_json_shape() {
        let status = Status::retryable("timeout", Some("IOException".to_string()))
            .with_source("normalize");
        let value: Value = serde_json::from_str(&status.to_json(false).unwrap()).unwrap();

        assert_eq!(value["isSuccess"], json!(false));
        assert_eq!(value["errorType"], json!("retryable"));
        assert_eq!(value["source"], json!("normalize"));
        assert_eq!(value["details"], json!({}));
        assert_eq!(value["durationMs"], json!(0));
        assert!(value["timestamp"].is_string());
        assert!(value["retryAfter"].is_string());
        assert!(value["code"].is_null());
    }
}
