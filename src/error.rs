//! Typed error taxonomy surfaced in ingestion results.

use thiserror::Error;

use crate::backend::BackendError;

/// Terminal failure categories for one ingestion run. The coordinator
/// catches everything at its boundary and reports exactly one of these in
/// the final result; no error escapes to the caller as a panic.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Neither the primary nor the fallback backend accepted a connection.
    #[error("cannot connect to any backend")]
    Connection,

    /// DDL rejected by the active backend.
    #[error("schema conflict: {0}")]
    SchemaConflict(String),

    /// Rows were rejected mid-chunk or fewer landed than were sent.
    #[error("insert failure on table '{table}': expected {expected} row(s), inserted {inserted}")]
    InsertFailure {
        table: String,
        expected: usize,
        inserted: usize,
    },

    /// Missing or invalid input file, unreadable sheet, or malformed
    /// template id.
    #[error("source error: {0}")]
    Source(String),

    /// The cooperative cancellation flag was honored at a chunk boundary.
    #[error("cancelled by user")]
    Cancelled,

    /// Backend failure outside the categories above.
    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for IngestError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::SchemaConflict { table, reason } => {
                IngestError::SchemaConflict(format!("table '{table}': {reason}"))
            }
            other => IngestError::Backend(other),
        }
    }
}
