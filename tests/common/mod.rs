#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use sheetload::backend::{BackendError, DatabaseBackend, TableInfo};
use sheetload::schema::{BackendKind, TableSchema};
use sheetload::source::RowChunk;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Observable switches shared between a test and its stub backend.
#[derive(Clone, Default)]
pub struct StubProbe {
    pub connected: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
    pub tables_created: Arc<AtomicUsize>,
    pub chunks_inserted: Arc<AtomicUsize>,
    pub rows_inserted: Arc<AtomicUsize>,
}

impl StubProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

/// In-memory stand-in for a database backend. Connection success is
/// scripted; every operation records into the probe so tests can assert
/// routing, counts, and release behavior.
pub struct StubBackend {
    kind: BackendKind,
    connect_ok: bool,
    short_insert_by: usize,
    probe: StubProbe,
}

impl StubBackend {
    pub fn healthy(kind: BackendKind, probe: StubProbe) -> Self {
        Self {
            kind,
            connect_ok: true,
            short_insert_by: 0,
            probe,
        }
    }

    pub fn unreachable(kind: BackendKind, probe: StubProbe) -> Self {
        Self {
            kind,
            connect_ok: false,
            short_insert_by: 0,
            probe,
        }
    }

    /// Makes every bulk insert report this many rows fewer than were sent.
    pub fn with_short_inserts(mut self, missing: usize) -> Self {
        self.short_insert_by = missing;
        self
    }
}

impl DatabaseBackend for StubBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn connect(&mut self) -> bool {
        if self.connect_ok {
            self.probe.connected.store(true, Ordering::SeqCst);
        }
        self.connect_ok
    }

    fn test(&mut self) -> bool {
        self.probe.connected.load(Ordering::SeqCst) || self.connect()
    }

    fn create_table(&mut self, _schema: &TableSchema) -> Result<(), BackendError> {
        self.ensure_connected()?;
        self.probe.tables_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn existing_columns(&mut self, _table: &str) -> Result<Option<Vec<String>>, BackendError> {
        self.ensure_connected()?;
        Ok(None)
    }

    fn alter_table(
        &mut self,
        _schema: &TableSchema,
        _existing: &[String],
    ) -> Result<usize, BackendError> {
        self.ensure_connected()?;
        Ok(0)
    }

    fn bulk_insert(
        &mut self,
        _schema: &TableSchema,
        chunk: &RowChunk,
    ) -> Result<usize, BackendError> {
        self.ensure_connected()?;
        let inserted = chunk.row_count().saturating_sub(self.short_insert_by);
        self.probe.chunks_inserted.fetch_add(1, Ordering::SeqCst);
        self.probe.rows_inserted.fetch_add(inserted, Ordering::SeqCst);
        Ok(inserted)
    }

    fn table_info(&mut self, table: &str) -> Result<TableInfo, BackendError> {
        self.ensure_connected()?;
        Ok(TableInfo {
            table_name: table.to_string(),
            row_count: self.probe.rows_inserted.load(Ordering::SeqCst) as u64,
            columns: vec![("id".to_string(), "INTEGER".to_string())],
        })
    }

    fn close(&mut self) {
        if self.probe.connected.load(Ordering::SeqCst) {
            self.probe.closed.store(true, Ordering::SeqCst);
        }
        self.probe.connected.store(false, Ordering::SeqCst);
    }
}

impl StubBackend {
    fn ensure_connected(&self) -> Result<(), BackendError> {
        if self.probe.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Unavailable("stub not connected".to_string()))
        }
    }
}
