//! Error taxonomy for the sync engine.
//!
//! Every failure crossing an I/O boundary (source API, store, cache lookup) is
//! classified into one [`SyncError`] variant. Callers branch on
//! [`SyncError::kind`] or [`SyncError::is_retryable`], never on message text.
//! Each error also exposes a stable machine-readable code and a structured
//! context object, and serializes to an [`ErrorPayload`] for logs and run
//! history.

use std::fmt;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

pub const CODE_VALIDATION: &str = "VALIDATION_ERROR";
pub const CODE_AUTHENTICATION: &str = "AUTH_ERROR";
pub const CODE_AUTHORIZATION: &str = "AUTHORIZATION_ERROR";
pub const CODE_NETWORK: &str = "NETWORK_ERROR";
pub const CODE_SYNC: &str = "SYNC_ERROR";
pub const CODE_DATA_PROCESSING: &str = "DATA_PROCESSING_ERROR";

/// Discriminant of a [`SyncError`], used for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    RemoteApi,
    Network,
    SyncOperation,
    DataProcessing,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::RemoteApi => "remote_api",
            Self::Network => "network",
            Self::SyncOperation => "sync_operation",
            Self::DataProcessing => "data_processing",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of errors raised by the sync engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// An input or field failed a domain rule.
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        /// The offending field, when one can be named.
        field: Option<String>,
    },

    /// Credentials were rejected by the source or store.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// The caller lacks permission for the resource.
    #[error("not authorized: {message}")]
    Authorization { message: String },

    /// The external source returned an application-level error.
    #[error("remote API error ({status}): {message}")]
    RemoteApi {
        message: String,
        /// Remote-specific code, `HTTP_{status}` unless the source supplied one.
        code: String,
        status: u16,
        /// Raw response body, parsed as JSON when possible.
        response_data: Option<Value>,
        /// Server-requested wait before retrying (`Retry-After`).
        retry_after_secs: Option<u64>,
    },

    /// Transport-level failure: timeout, connection reset, DNS.
    #[error("network error: {message}")]
    Network { message: String },

    /// A pipeline step failed for a reason not covered by another kind.
    #[error("sync operation '{operation}' failed: {message}")]
    SyncOperation {
        message: String,
        operation: String,
        retryable: bool,
    },

    /// A single fetched record could not be normalized or upserted.
    #[error(
        "could not process record {record}: {message}",
        record = .record_id.as_deref().unwrap_or("<unknown>")
    )]
    DataProcessing {
        message: String,
        record_id: Option<String>,
    },
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// A remote application error with the default `HTTP_{status}` code.
    pub fn remote_api(
        status: u16,
        message: impl Into<String>,
        response_data: Option<Value>,
    ) -> Self {
        Self::RemoteApi {
            message: message.into(),
            code: format!("HTTP_{status}"),
            status,
            response_data,
            retry_after_secs: None,
        }
    }

    /// A 429 response. Always retryable.
    pub fn rate_limited(retry_after_secs: u64, response_data: Option<Value>) -> Self {
        Self::RemoteApi {
            message: format!("rate limited, retry after {retry_after_secs}s"),
            code: "HTTP_429".to_string(),
            status: 429,
            response_data,
            retry_after_secs: Some(retry_after_secs),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn sync_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::SyncOperation {
            message: message.into(),
            operation: operation.into(),
            retryable,
        }
    }

    pub fn data_processing(record_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::DataProcessing {
            message: message.into(),
            record_id: record_id.map(String::from),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::RemoteApi { .. } => ErrorKind::RemoteApi,
            Self::Network { .. } => ErrorKind::Network,
            Self::SyncOperation { .. } => ErrorKind::SyncOperation,
            Self::DataProcessing { .. } => ErrorKind::DataProcessing,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Validation { .. } => CODE_VALIDATION,
            Self::Authentication { .. } => CODE_AUTHENTICATION,
            Self::Authorization { .. } => CODE_AUTHORIZATION,
            Self::RemoteApi { code, .. } => code,
            Self::Network { .. } => CODE_NETWORK,
            Self::SyncOperation { .. } => CODE_SYNC,
            Self::DataProcessing { .. } => CODE_DATA_PROCESSING,
        }
    }

    /// Human-readable message without the kind prefix added by `Display`.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Authentication { message }
            | Self::Authorization { message }
            | Self::RemoteApi { message, .. }
            | Self::Network { message }
            | Self::SyncOperation { message, .. }
            | Self::DataProcessing { message, .. } => message,
        }
    }

    /// Whether retrying the same call can succeed without operator action.
    ///
    /// Remote errors are retryable only for 429 and 5xx statuses.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::RemoteApi { status, .. } => *status == 429 || (*status >= 500 && *status < 600),
            Self::SyncOperation { retryable, .. } => *retryable,
            Self::Validation { .. }
            | Self::Authentication { .. }
            | Self::Authorization { .. }
            | Self::DataProcessing { .. } => false,
        }
    }

    /// Authentication and authorization failures abort a run immediately.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Authorization { .. })
    }

    /// Errors absorbed at record granularity: the record is skipped and the
    /// run continues.
    #[must_use]
    pub const fn is_record_scoped(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::DataProcessing { .. })
    }

    /// Server-requested backoff, if the source sent one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RemoteApi {
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Structured context for serialization. Always a JSON object.
    #[must_use]
    pub fn context(&self) -> Value {
        match self {
            Self::Validation { field, .. } => json!({ "field": field }),
            Self::Authentication { .. } | Self::Authorization { .. } | Self::Network { .. } => {
                json!({})
            }
            Self::RemoteApi {
                status,
                response_data,
                retry_after_secs,
                ..
            } => json!({
                "status_code": status,
                "response_data": response_data,
                "retry_after_secs": retry_after_secs,
            }),
            Self::SyncOperation {
                operation,
                retryable,
                ..
            } => json!({ "operation": operation, "retryable": retryable }),
            Self::DataProcessing { record_id, .. } => json!({ "record_id": record_id }),
        }
    }

    /// Serializable `{message, code, context}` form.
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            message: self.message().to_string(),
            code: self.code().to_string(),
            kind: self.kind(),
            context: self.context(),
        }
    }
}

/// Operator-facing serialized form of a [`SyncError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
    pub kind: ErrorKind,
    pub context: Value,
}
