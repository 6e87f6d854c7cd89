//! The database backend seam.
//!
//! Two concrete stores implement [`DatabaseBackend`]: a pooled networked
//! PostgreSQL backend ([`crate::postgres`]) and an embedded SQLite file
//! backend ([`crate::sqlite`]). Callers hold the trait object, never a
//! concrete backend; the hybrid manager decides which one is live.

use thiserror::Error;

use crate::{
    schema::{BackendKind, TableSchema},
    source::RowChunk,
};

/// Typed failures raised by backend operations. Recoverable data-shape
/// issues (nulls, unparsable numerics) are coerced before binding and
/// never surface here.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No live connection, or the engine went away.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// DDL rejected by the engine.
    #[error("schema conflict on table '{table}': {reason}")]
    SchemaConflict { table: String, reason: String },

    /// Engine rejected rows mid-chunk, or fewer rows landed than were sent.
    #[error("insert failure on table '{table}': {reason}")]
    InsertFailure { table: String, reason: String },

    /// Driver-level error outside the categories above.
    #[error("database driver error: {0}")]
    Driver(String),
}

/// Final table metadata reported once ingestion completes.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub table_name: String,
    pub row_count: u64,
    pub columns: Vec<(String, String)>,
}

/// Capability set shared by the primary and fallback stores.
pub trait DatabaseBackend {
    fn kind(&self) -> BackendKind;

    /// Establishes the connection (pool). Logs and returns `false` on any
    /// failure; never panics.
    fn connect(&mut self) -> bool;

    /// Lightweight liveness probe; connects first if needed.
    fn test(&mut self) -> bool;

    /// Drops any pre-existing table of the same name, then creates it
    /// fresh. Destructive and safe to repeat within a run.
    fn create_table(&mut self, schema: &TableSchema) -> Result<(), BackendError>;

    /// Column names of an existing table, or `None` when the table does
    /// not exist.
    fn existing_columns(&mut self, table: &str) -> Result<Option<Vec<String>>, BackendError>;

    /// Adds the schema columns missing from `existing`; returns how many
    /// columns were added.
    fn alter_table(
        &mut self,
        schema: &TableSchema,
        existing: &[String],
    ) -> Result<usize, BackendError>;

    /// Appends one chunk, returning the engine-reported inserted count.
    fn bulk_insert(&mut self, schema: &TableSchema, chunk: &RowChunk)
    -> Result<usize, BackendError>;

    fn table_info(&mut self, table: &str) -> Result<TableInfo, BackendError>;

    /// Releases the connection. Idempotent.
    fn close(&mut self);
}
