//! Embedded fallback backend: a single SQLite database file.

use std::path::PathBuf;

use log::{debug, error, info};
use rusqlite::{Connection, params_from_iter, types::Value as SqliteValue};

use crate::{
    backend::{BackendError, DatabaseBackend, TableInfo},
    data::{SqlParam, coerce_for_insert},
    schema::{BackendKind, TableSchema},
    source::RowChunk,
};

pub struct SqliteBackend {
    path: PathBuf,
    connection: Option<Connection>,
}

impl SqliteBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            connection: None,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn conn(&mut self) -> Result<&mut Connection, BackendError> {
        self.connection
            .as_mut()
            .ok_or_else(|| BackendError::Unavailable("SQLite not connected".to_string()))
    }

    fn bind_value(param: &SqlParam) -> SqliteValue {
        match param {
            SqlParam::Null => SqliteValue::Null,
            SqlParam::Integer(i) => SqliteValue::Integer(*i),
            SqlParam::Float(f) => SqliteValue::Real(*f),
            SqlParam::Boolean(b) => SqliteValue::Integer(i64::from(*b)),
            SqlParam::DateTime(dt) => {
                SqliteValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            SqlParam::Text(s) => SqliteValue::Text(s.clone()),
        }
    }
}

impl DatabaseBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn connect(&mut self) -> bool {
        if self.connection.is_some() {
            return true;
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty())
            && let Err(err) = std::fs::create_dir_all(parent)
        {
            error!("SQLite fallback directory creation failed: {err}");
            return false;
        }
        match Connection::open(&self.path) {
            Ok(connection) => {
                info!("SQLite fallback connected: {}", self.path.display());
                self.connection = Some(connection);
                true
            }
            Err(err) => {
                error!("SQLite connection failed: {err}");
                false
            }
        }
    }

    fn test(&mut self) -> bool {
        if self.connection.is_none() && !self.connect() {
            return false;
        }
        match self.conn() {
            Ok(conn) => conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map(|value| value == 1)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn create_table(&mut self, schema: &TableSchema) -> Result<(), BackendError> {
        let drop_sql = schema.drop_ddl(BackendKind::Sqlite);
        let create_sql = schema.create_ddl(BackendKind::Sqlite);
        let table = schema.name.clone();
        let conn = self.conn()?;
        conn.execute_batch(&format!("{drop_sql}; {create_sql};"))
            .map_err(|err| BackendError::SchemaConflict {
                table,
                reason: err.to_string(),
            })?;
        info!("SQLite table '{}' created", schema.name);
        Ok(())
    }

    fn existing_columns(&mut self, table: &str) -> Result<Option<Vec<String>>, BackendError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        if columns.is_empty() {
            Ok(None)
        } else {
            Ok(Some(columns))
        }
    }

    fn alter_table(
        &mut self,
        schema: &TableSchema,
        existing: &[String],
    ) -> Result<usize, BackendError> {
        let statements = schema.alter_ddl(existing, BackendKind::Sqlite);
        let table = schema.name.clone();
        let conn = self.conn()?;
        for statement in &statements {
            debug!("SQLite ALTER: {statement}");
            conn.execute(statement, [])
                .map_err(|err| BackendError::SchemaConflict {
                    table: table.clone(),
                    reason: err.to_string(),
                })?;
        }
        Ok(statements.len())
    }

    fn bulk_insert(
        &mut self,
        schema: &TableSchema,
        chunk: &RowChunk,
    ) -> Result<usize, BackendError> {
        let insert_sql = schema.insert_sql(BackendKind::Sqlite);
        let column_types: Vec<_> = schema.data_columns().map(|c| c.datatype).collect();
        let table = schema.name.clone();

        let conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx
                .prepare(&insert_sql)
                .map_err(|err| BackendError::Driver(err.to_string()))?;
            for row in &chunk.rows {
                let values: Vec<SqliteValue> = column_types
                    .iter()
                    .enumerate()
                    .map(|(idx, ty)| {
                        let cell = row.get(idx).cloned().unwrap_or(crate::data::Cell::Null);
                        Self::bind_value(&coerce_for_insert(&cell, *ty))
                    })
                    .collect();
                inserted += stmt.execute(params_from_iter(values)).map_err(|err| {
                    BackendError::InsertFailure {
                        table: table.clone(),
                        reason: err.to_string(),
                    }
                })?;
            }
        }
        tx.commit()
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        debug!("SQLite inserted {inserted} row(s) into '{}'", schema.name);
        Ok(inserted)
    }

    fn table_info(&mut self, table: &str) -> Result<TableInfo, BackendError> {
        if self.existing_columns(table)?.is_none() {
            return Err(BackendError::Driver(format!(
                "Table '{table}' does not exist"
            )));
        }
        let conn = self.conn()?;
        let row_count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| {
                row.get(0)
            })
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT name, type FROM pragma_table_info(?1)")
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        let typed_columns = stmt
            .query_map([table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        Ok(TableInfo {
            table_name: table.to_string(),
            row_count: row_count as u64,
            columns: typed_columns,
        })
    }

    fn close(&mut self) {
        if self.connection.take().is_some() {
            debug!("SQLite connection closed: {}", self.path.display());
        }
    }
}
