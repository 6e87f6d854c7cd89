//! Append-only JSON audit log of schema changes, capped at the most
//! recent 100 entries. The log is written for operators to inspect; it is
//! never read back to drive ingestion behavior.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{ColumnDef, TableSchema};

pub const HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaAction {
    Create,
    Alter,
}

impl SchemaAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaAction::Create => "CREATE",
            SchemaAction::Alter => "ALTER",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub action: SchemaAction,
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, Clone)]
pub struct SchemaHistory {
    path: PathBuf,
}

impl SchemaHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and rewrites the log, keeping the newest
    /// [`HISTORY_CAP`] entries.
    pub fn record(&self, action: SchemaAction, schema: &TableSchema) -> Result<()> {
        let mut entries = self.load().unwrap_or_default();
        entries.push(SchemaChangeRecord {
            timestamp: Utc::now(),
            action,
            table_name: schema.name.clone(),
            columns: schema.columns.clone(),
        });
        if entries.len() > HISTORY_CAP {
            entries.drain(..entries.len() - HISTORY_CAP);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating history directory {parent:?}"))?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("Creating history file {:?}", self.path))?;
        serde_json::to_writer_pretty(file, &entries).context("Writing schema history JSON")
    }

    pub fn load(&self) -> Result<Vec<SchemaChangeRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("Opening history file {:?}", self.path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context("Parsing schema history JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;

    fn schema(table: &str) -> TableSchema {
        let columns = vec!["name".to_string()];
        let rows = vec![vec![Cell::Text("x".into())]];
        TableSchema::from_sample(table, &columns, &rows)
    }

    #[test]
    fn record_appends_and_loads_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let history = SchemaHistory::new(dir.path().join("schema_history.json"));

        history
            .record(SchemaAction::Create, &schema("orders"))
            .expect("record create");
        history
            .record(SchemaAction::Alter, &schema("orders"))
            .expect("record alter");

        let entries = history.load().expect("load history");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, SchemaAction::Create);
        assert_eq!(entries[1].action, SchemaAction::Alter);
        assert_eq!(entries[1].table_name, "orders");
        assert!(entries[1].columns.iter().any(|c| c.name == "id"));
    }

    #[test]
    fn history_keeps_only_newest_hundred_entries() {
        let dir = tempfile::tempdir().expect("temp dir");
        let history = SchemaHistory::new(dir.path().join("schema_history.json"));

        for i in 0..HISTORY_CAP + 5 {
            history
                .record(SchemaAction::Create, &schema(&format!("t{i}")))
                .expect("record");
        }

        let entries = history.load().expect("load history");
        assert_eq!(entries.len(), HISTORY_CAP);
        assert_eq!(entries[0].table_name, "t5");
        assert_eq!(entries.last().unwrap().table_name, format!("t{}", HISTORY_CAP + 4));
    }
}
