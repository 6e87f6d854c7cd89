//! Hybrid connection manager: primary backend with transparent fallback.
//!
//! `connect()` tries the primary store first and downgrades to the
//! fallback on failure. Once a run is downgraded it stays on the fallback
//! for consistency; there is no automatic promotion back. The manager
//! exclusively owns the live connection for the duration of one run.

use log::{info, warn};

use crate::{
    backend::{BackendError, DatabaseBackend, TableInfo},
    schema::TableSchema,
    source::RowChunk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    PrimaryActive,
    FallbackActive,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "none",
            ConnectionState::PrimaryActive => "primary",
            ConnectionState::FallbackActive => "fallback",
        }
    }
}

pub struct HybridManager {
    primary: Option<Box<dyn DatabaseBackend>>,
    fallback: Box<dyn DatabaseBackend>,
    state: ConnectionState,
}

impl HybridManager {
    pub fn new(primary: Box<dyn DatabaseBackend>, fallback: Box<dyn DatabaseBackend>) -> Self {
        Self {
            primary: Some(primary),
            fallback,
            state: ConnectionState::Disconnected,
        }
    }

    /// A manager that skips the primary entirely and connects straight to
    /// the embedded store.
    pub fn fallback_only(fallback: Box<dyn DatabaseBackend>) -> Self {
        Self {
            primary: None,
            fallback,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Role name of the live backend, for result reporting.
    pub fn active_role(&self) -> &'static str {
        self.state.as_str()
    }

    pub fn connect(&mut self) -> bool {
        if self.state != ConnectionState::Disconnected {
            return true;
        }
        if let Some(primary) = self.primary.as_mut() {
            info!("Attempting primary backend connection");
            if primary.connect() {
                self.state = ConnectionState::PrimaryActive;
                return true;
            }
            warn!("Primary backend unavailable, falling back to embedded store");
        }
        if self.fallback.connect() {
            self.state = ConnectionState::FallbackActive;
            return true;
        }
        self.state = ConnectionState::Disconnected;
        false
    }

    pub fn test(&mut self) -> bool {
        match self.state {
            ConnectionState::Disconnected => self.connect(),
            ConnectionState::PrimaryActive => self
                .primary
                .as_mut()
                .map(|backend| backend.test())
                .unwrap_or(false),
            ConnectionState::FallbackActive => self.fallback.test(),
        }
    }

    fn active(&mut self) -> Result<&mut (dyn DatabaseBackend + 'static), BackendError> {
        match self.state {
            ConnectionState::PrimaryActive => self
                .primary
                .as_mut()
                .map(|backend| backend.as_mut())
                .ok_or_else(|| BackendError::Unavailable("Primary backend missing".to_string())),
            ConnectionState::FallbackActive => Ok(self.fallback.as_mut()),
            ConnectionState::Disconnected => Err(BackendError::Unavailable(
                "No database connected".to_string(),
            )),
        }
    }

    pub fn create_table(&mut self, schema: &TableSchema) -> Result<(), BackendError> {
        self.active()?.create_table(schema)
    }

    pub fn existing_columns(&mut self, table: &str) -> Result<Option<Vec<String>>, BackendError> {
        self.active()?.existing_columns(table)
    }

    pub fn alter_table(
        &mut self,
        schema: &TableSchema,
        existing: &[String],
    ) -> Result<usize, BackendError> {
        self.active()?.alter_table(schema, existing)
    }

    pub fn bulk_insert(
        &mut self,
        schema: &TableSchema,
        chunk: &RowChunk,
    ) -> Result<usize, BackendError> {
        self.active()?.bulk_insert(schema, chunk)
    }

    pub fn table_info(&mut self, table: &str) -> Result<TableInfo, BackendError> {
        self.active()?.table_info(table)
    }

    /// Releases whichever backend is live and returns to `Disconnected`.
    pub fn close(&mut self) {
        if let Some(primary) = self.primary.as_mut() {
            primary.close();
        }
        self.fallback.close();
        self.state = ConnectionState::Disconnected;
    }
}
