//! Database error types for relay-db.

use relay_core::errors::SyncError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned malformed data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// A state transition the run log does not allow.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Payload could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

impl DatabaseError {
    /// Lock contention that clears on its own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        let Self::LibSql(e) = self else {
            return false;
        };
        let msg = e.to_string();
        msg.contains("database is locked")
            || msg.contains("database is busy")
            || msg.contains("SQLITE_BUSY")
    }

    /// A concurrent insert already claimed the natural key.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::LibSql(e) if e.to_string().contains("UNIQUE constraint failed"))
    }

    /// Caused by the data of one row rather than the store itself: a
    /// malformed stored row, a payload that does not encode, or a constraint
    /// the row breaks.
    #[must_use]
    pub fn is_row_scoped(&self) -> bool {
        match self {
            Self::Query(_) | Self::Json(_) | Self::InvalidState(_) => true,
            Self::LibSql(e) => {
                let msg = e.to_string();
                msg.contains("constraint failed")
                    || msg.contains("datatype mismatch")
                    || msg.contains("too big")
            }
            Self::Migration(_) | Self::NoResult => false,
        }
    }

    /// Classify for the orchestrator, labelling the failed step.
    #[must_use]
    pub fn into_sync_error(self, operation: &str) -> SyncError {
        let retryable = self.is_transient();
        SyncError::sync_operation(operation, self.to_string(), retryable)
    }

    /// Classify a failure while writing the record `external_id`. Row-scoped
    /// failures become `DataProcessing` so only that record is skipped.
    #[must_use]
    pub fn into_record_error(self, external_id: &str, operation: &str) -> SyncError {
        if self.is_row_scoped() {
            SyncError::data_processing(Some(external_id), format!("{operation}: {self}"))
        } else {
            self.into_sync_error(operation)
        }
    }
}

impl From<DatabaseError> for SyncError {
    fn from(e: DatabaseError) -> Self {
        e.into_sync_error("store")
    }
}
