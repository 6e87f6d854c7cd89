//! Ingestion coordinator.
//!
//! Drives one run through `Connecting -> Preparing -> Processing ->
//! Finalizing` and always returns a terminal [`IngestionResult`]. Errors
//! raised anywhere inside the pipeline are caught at this boundary and
//! converted into a failed result carrying the partial row count; the
//! active connection is released on every exit path.
//!
//! The coordinator spawns no threads. Callers that need a background run
//! own the threading and talk to the run through the cancellation handle
//! and the progress/log callbacks. Callbacks are treated as synchronous
//! and possibly UI-owned: a panicking callback is caught and logged, never
//! propagated.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};

use crate::{
    error::IngestError,
    history::{SchemaAction, SchemaHistory},
    hybrid::HybridManager,
    infer::infer_types,
    mock::{MockSource, MockTemplate},
    postgres::{PostgresBackend, PostgresSettings},
    schema::TableSchema,
    source::{RowSource, SpreadsheetSource},
    sqlite::SqliteBackend,
};

#[derive(Debug, Clone)]
pub enum SourceConfig {
    Mock {
        template: MockTemplate,
        rows: usize,
        seed: Option<u64>,
    },
    Spreadsheet {
        path: PathBuf,
        sheet: Option<String>,
        encoding: Option<String>,
    },
}

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableMode {
    /// Drop and recreate (the default; data-destructive, schema-idempotent).
    #[default]
    Replace,
    /// Keep existing rows and add any new columns via ALTER TABLE.
    Append,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub chunk_size: usize,
    pub batch_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            batch_size: 200,
        }
    }
}

/// Database targets for one run. `postgres: None` skips the primary and
/// goes straight to the embedded fallback.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub postgres: Option<PostgresSettings>,
    pub sqlite_path: PathBuf,
}

/// Immutable configuration for one ingestion run, assembled by the caller.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub source: SourceConfig,
    pub table_name: String,
    pub database: DatabaseSettings,
    pub processing: ProcessingConfig,
    pub mode: TableMode,
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub percent: f64,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

type ProgressCallback = Box<dyn Fn(&ProgressUpdate)>;
type LogCallback = Box<dyn Fn(&str, &str)>;

/// Terminal value of one run; never mutated after return.
#[derive(Debug)]
pub struct IngestionResult {
    pub success: bool,
    pub rows_processed: u64,
    pub duration_seconds: f64,
    pub table_name: String,
    pub backend_used: String,
    pub error: Option<IngestError>,
}

impl IngestionResult {
    pub fn was_cancelled(&self) -> bool {
        matches!(self.error, Some(IngestError::Cancelled))
    }
}

pub struct Coordinator {
    config: IngestConfig,
    manager: HybridManager,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
    log: Option<LogCallback>,
}

impl Coordinator {
    /// Builds the coordinator with real backends derived from the
    /// database settings.
    pub fn new(config: IngestConfig) -> Self {
        let fallback = Box::new(SqliteBackend::new(&config.database.sqlite_path));
        let manager = match &config.database.postgres {
            Some(settings) => {
                let primary = PostgresBackend::new(settings.clone())
                    .with_batch_size(config.processing.batch_size);
                HybridManager::new(Box::new(primary), fallback)
            }
            None => HybridManager::fallback_only(fallback),
        };
        Self::with_manager(config, manager)
    }

    /// Injects a pre-built hybrid manager, letting callers supply their
    /// own backend implementations.
    pub fn with_manager(config: IngestConfig, manager: HybridManager) -> Self {
        Self {
            config,
            manager,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
            log: None,
        }
    }

    pub fn on_progress(mut self, callback: impl Fn(&ProgressUpdate) + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn on_log(mut self, callback: impl Fn(&str, &str) + 'static) -> Self {
        self.log = Some(Box::new(callback));
        self
    }

    /// Shared flag for cooperative cancellation. Setting it stops the run
    /// at the next chunk boundary; the in-flight chunk is never
    /// interrupted and already-inserted rows stay put.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn run(mut self) -> IngestionResult {
        let started = Instant::now();
        let mut rows_processed = 0u64;
        let outcome = self.run_pipeline(&mut rows_processed);

        let backend_used = self.manager.active_role().to_string();
        self.manager.close();
        let duration_seconds = started.elapsed().as_secs_f64();

        match outcome {
            Ok(()) => {
                self.emit_progress(100.0, "Done");
                let rate = if duration_seconds > 0.0 {
                    rows_processed as f64 / duration_seconds
                } else {
                    0.0
                };
                self.emit_log(
                    &format!(
                        "Ingestion finished: {rows_processed} row(s) in {duration_seconds:.2}s ({rate:.0} rows/s)"
                    ),
                    "info",
                );
                IngestionResult {
                    success: true,
                    rows_processed,
                    duration_seconds,
                    table_name: self.config.table_name.clone(),
                    backend_used,
                    error: None,
                }
            }
            Err(err) => {
                self.emit_log(&format!("Ingestion failed: {err}"), "error");
                IngestionResult {
                    success: false,
                    rows_processed,
                    duration_seconds,
                    table_name: self.config.table_name.clone(),
                    backend_used,
                    error: Some(err),
                }
            }
        }
    }

    fn run_pipeline(&mut self, rows_processed: &mut u64) -> Result<(), IngestError> {
        self.emit_progress(5.0, "Connecting to database");
        if !self.manager.connect() {
            return Err(IngestError::Connection);
        }
        self.emit_log(
            &format!("Connected via {} backend", self.manager.active_role()),
            "info",
        );

        self.emit_progress(15.0, "Preparing data source");
        let source = self.build_source()?;
        let total_rows = source
            .total_rows()
            .map_err(|err| IngestError::Source(err.to_string()))?;
        self.emit_log(
            &format!("Source ready: {} ({total_rows} row(s))", source.describe()),
            "info",
        );

        self.emit_progress(30.0, "Processing data");
        let chunk_size = self.config.processing.chunk_size;
        let chunks = source
            .chunks(chunk_size)
            .map_err(|err| IngestError::Source(err.to_string()))?;

        let mut schema: Option<TableSchema> = None;
        for chunk_result in chunks {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(IngestError::Cancelled);
            }
            let chunk = chunk_result.map_err(|err| IngestError::Source(err.to_string()))?;

            if chunk.number == 1 {
                let mapping = match &chunk.type_mapping {
                    Some(mapping) => mapping.clone(),
                    None => infer_types(&chunk.columns, &chunk.rows),
                };
                let built = TableSchema::from_sample_with_types(
                    &self.config.table_name,
                    &chunk.columns,
                    &chunk.rows,
                    &mapping,
                );
                self.prepare_table(&built)?;
                schema = Some(built);
            }
            let Some(schema) = schema.as_ref() else {
                return Err(IngestError::Source(
                    "Chunk sequence did not start at chunk 1".to_string(),
                ));
            };

            let expected = chunk.row_count();
            let inserted = self.manager.bulk_insert(schema, &chunk)?;
            if inserted != expected {
                return Err(IngestError::InsertFailure {
                    table: schema.name.clone(),
                    expected,
                    inserted,
                });
            }
            *rows_processed += inserted as u64;

            let percent = if total_rows > 0 {
                (30.0 + 60.0 * *rows_processed as f64 / total_rows as f64).min(90.0)
            } else {
                90.0
            };
            self.emit_progress(
                percent,
                &format!("Processed {rows_processed}/{total_rows} row(s)"),
            );
            self.emit_log(
                &format!(
                    "Inserted {inserted} row(s) from chunk {} (total {rows_processed})",
                    chunk.number
                ),
                "debug",
            );
        }

        self.emit_progress(95.0, "Finalizing");
        let info = self.manager.table_info(&self.config.table_name)?;
        self.emit_log(
            &format!(
                "Table '{}' holds {} row(s) across {} column(s)",
                info.table_name,
                info.row_count,
                info.columns.len()
            ),
            "info",
        );
        Ok(())
    }

    /// Creates or evolves the target table from the first-chunk schema and
    /// appends the audit record. History write failures are logged, not
    /// fatal, since the log is advisory only.
    fn prepare_table(&mut self, schema: &TableSchema) -> Result<(), IngestError> {
        let action = match self.config.mode {
            TableMode::Replace => {
                self.manager.create_table(schema)?;
                self.emit_log(&format!("Table '{}' created", schema.name), "info");
                SchemaAction::Create
            }
            TableMode::Append => match self.manager.existing_columns(&schema.name)? {
                Some(existing) => {
                    let added = self.manager.alter_table(schema, &existing)?;
                    self.emit_log(
                        &format!("Table '{}' evolved: {added} new column(s)", schema.name),
                        "info",
                    );
                    if added == 0 {
                        return Ok(());
                    }
                    SchemaAction::Alter
                }
                None => {
                    self.manager.create_table(schema)?;
                    self.emit_log(&format!("Table '{}' created", schema.name), "info");
                    SchemaAction::Create
                }
            },
        };

        if let Some(path) = &self.config.history_file {
            let history = SchemaHistory::new(path);
            if let Err(err) = history.record(action, schema) {
                warn!("Schema history write failed: {err}");
            }
        }
        Ok(())
    }

    fn build_source(&self) -> Result<Box<dyn RowSource>, IngestError> {
        match &self.config.source {
            SourceConfig::Mock {
                template,
                rows,
                seed,
            } => Ok(Box::new(MockSource::new(*template, *rows).with_seed(*seed))),
            SourceConfig::Spreadsheet {
                path,
                sheet,
                encoding,
            } => {
                let source = SpreadsheetSource::new(path, sheet.clone())
                    .with_encoding(encoding.clone());
                source
                    .validate()
                    .map_err(|err| IngestError::Source(err.to_string()))?;
                Ok(Box::new(source))
            }
        }
    }

    fn emit_progress(&self, percent: f64, message: &str) {
        debug!("Progress {percent:.0}%: {message}");
        if let Some(callback) = &self.progress {
            let update = ProgressUpdate {
                percent,
                message: message.to_string(),
                timestamp: Local::now(),
            };
            if catch_unwind(AssertUnwindSafe(|| callback(&update))).is_err() {
                warn!("Progress callback panicked; update dropped");
            }
        }
    }

    fn emit_log(&self, message: &str, level: &str) {
        match level {
            "error" => error!("{message}"),
            "warn" => warn!("{message}"),
            "debug" => debug!("{message}"),
            _ => info!("{message}"),
        }
        if let Some(callback) = &self.log {
            if catch_unwind(AssertUnwindSafe(|| callback(message, level))).is_err() {
                warn!("Log callback panicked; message dropped");
            }
        }
    }
}
