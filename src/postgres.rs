//! Primary networked backend: PostgreSQL behind a bounded `r2d2` pool.
//!
//! The pool (size, connection timeout, recycle lifetime) is an
//! implementation detail of this backend; the coordinator only ever sees
//! the [`DatabaseBackend`] capability set.

use std::time::Duration;

use itertools::Itertools;
use log::{debug, error, info};
use postgres::{NoTls, types::ToSql};
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

use crate::{
    backend::{BackendError, DatabaseBackend, TableInfo},
    data::{SemanticType, SqlParam, coerce_for_insert},
    schema::{BackendKind, TableSchema},
    source::RowChunk,
};

/// Connection and pool settings for the primary backend, assembled by the
/// caller (CLI flags or library configuration).
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_size: u32,
    pub connect_timeout_secs: u64,
    pub recycle_secs: u64,
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            pool_size: 3,
            connect_timeout_secs: 10,
            recycle_secs: 1800,
        }
    }
}

const DEFAULT_INSERT_BATCH: usize = 200;

pub struct PostgresBackend {
    settings: PostgresSettings,
    batch_size: usize,
    pool: Option<Pool<PostgresConnectionManager<NoTls>>>,
}

impl PostgresBackend {
    pub fn new(settings: PostgresSettings) -> Self {
        Self {
            settings,
            batch_size: DEFAULT_INSERT_BATCH,
            pool: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn client(
        &self,
    ) -> Result<r2d2::PooledConnection<PostgresConnectionManager<NoTls>>, BackendError> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| BackendError::Unavailable("PostgreSQL not connected".to_string()))?;
        pool.get()
            .map_err(|err| BackendError::Unavailable(err.to_string()))
    }

    fn bind_value(param: SqlParam, ty: SemanticType) -> Box<dyn ToSql + Sync> {
        match ty {
            SemanticType::Integer => Box::new(param.as_integer()),
            SemanticType::Float => Box::new(param.as_float()),
            SemanticType::Boolean => Box::new(param.as_boolean()),
            SemanticType::DateTime => Box::new(param.as_datetime()),
            SemanticType::String | SemanticType::Text => Box::new(param.as_text()),
        }
    }

    /// Multi-row VALUES statement for one insert batch, numbering
    /// placeholders column-major across rows.
    fn batch_insert_sql(schema: &TableSchema, rows: usize) -> String {
        let columns = schema
            .data_columns()
            .map(|c| format!("\"{}\"", c.name))
            .join(", ");
        let width = schema.data_columns().count();
        let tuples = (0..rows)
            .map(|row| {
                let placeholders = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .join(", ");
                format!("({placeholders})")
            })
            .join(", ");
        format!(
            "INSERT INTO \"{}\" ({columns}) VALUES {tuples}",
            schema.name
        )
    }
}

impl DatabaseBackend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn connect(&mut self) -> bool {
        if self.pool.is_some() {
            return true;
        }
        let mut config = postgres::Config::new();
        config
            .host(&self.settings.host)
            .port(self.settings.port)
            .dbname(&self.settings.database)
            .user(&self.settings.user)
            .password(&self.settings.password)
            .connect_timeout(Duration::from_secs(self.settings.connect_timeout_secs));

        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(self.settings.pool_size)
            .connection_timeout(Duration::from_secs(self.settings.connect_timeout_secs))
            .max_lifetime(Some(Duration::from_secs(self.settings.recycle_secs)))
            .build(manager);

        match pool {
            Ok(pool) => {
                info!(
                    "PostgreSQL connected: {}:{}/{}",
                    self.settings.host, self.settings.port, self.settings.database
                );
                self.pool = Some(pool);
                true
            }
            Err(err) => {
                error!(
                    "PostgreSQL connection failed ({}:{}): {err}",
                    self.settings.host, self.settings.port
                );
                false
            }
        }
    }

    fn test(&mut self) -> bool {
        if self.pool.is_none() && !self.connect() {
            return false;
        }
        match self.client() {
            Ok(mut client) => client
                .query_one("SELECT 1", &[])
                .map(|row| row.get::<_, i32>(0) == 1)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn create_table(&mut self, schema: &TableSchema) -> Result<(), BackendError> {
        let mut client = self.client()?;
        let ddl = format!(
            "{}; {};",
            schema.drop_ddl(BackendKind::Postgres),
            schema.create_ddl(BackendKind::Postgres)
        );
        client
            .batch_execute(&ddl)
            .map_err(|err| BackendError::SchemaConflict {
                table: schema.name.clone(),
                reason: err.to_string(),
            })?;
        info!("PostgreSQL table '{}' created", schema.name);
        Ok(())
    }

    fn existing_columns(&mut self, table: &str) -> Result<Option<Vec<String>>, BackendError> {
        let mut client = self.client()?;
        let rows = client
            .query(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = $1 \
                 ORDER BY ordinal_position",
                &[&table],
            )
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.iter().map(|row| row.get(0)).collect()))
        }
    }

    fn alter_table(
        &mut self,
        schema: &TableSchema,
        existing: &[String],
    ) -> Result<usize, BackendError> {
        let statements = schema.alter_ddl(existing, BackendKind::Postgres);
        let mut client = self.client()?;
        for statement in &statements {
            debug!("PostgreSQL ALTER: {statement}");
            client
                .execute(statement.as_str(), &[])
                .map_err(|err| BackendError::SchemaConflict {
                    table: schema.name.clone(),
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
        let column_types: Vec<_> = schema.data_columns().map(|c| c.datatype).collect();
        let mut client = self.client()?;
        let mut inserted = 0u64;

        for batch in chunk.rows.chunks(self.batch_size) {
            let sql = Self::batch_insert_sql(schema, batch.len());
            let values: Vec<Box<dyn ToSql + Sync>> = batch
                .iter()
                .flat_map(|row| {
                    column_types.iter().enumerate().map(|(idx, ty)| {
                        let cell = row.get(idx).cloned().unwrap_or(crate::data::Cell::Null);
                        Self::bind_value(coerce_for_insert(&cell, *ty), *ty)
                    })
                })
                .collect();
            let params: Vec<&(dyn ToSql + Sync)> =
                values.iter().map(|v| v.as_ref()).collect();
            inserted += client.execute(sql.as_str(), &params).map_err(|err| {
                BackendError::InsertFailure {
                    table: schema.name.clone(),
                    reason: err.to_string(),
                }
            })?;
        }

        debug!(
            "PostgreSQL inserted {inserted} row(s) into '{}'",
            schema.name
        );
        Ok(inserted as usize)
    }

    fn table_info(&mut self, table: &str) -> Result<TableInfo, BackendError> {
        if self.existing_columns(table)?.is_none() {
            return Err(BackendError::Driver(format!(
                "Table '{table}' does not exist"
            )));
        }
        let mut client = self.client()?;
        let count_sql = format!("SELECT COUNT(*) FROM \"{table}\"");
        let count_row = client
            .query_one(count_sql.as_str(), &[])
            .map_err(|err| BackendError::Driver(err.to_string()))?;
        let row_count: i64 = count_row.get(0);
        let typed = client
            .query(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = $1 \
                 ORDER BY ordinal_position",
                &[&table],
            )
            .map_err(|err| BackendError::Driver(err.to_string()))?
            .iter()
            .map(|row| (row.get(0), row.get(1)))
            .collect();
        Ok(TableInfo {
            table_name: table.to_string(),
            row_count: row_count as u64,
            columns: typed,
        })
    }

    fn close(&mut self) {
        if self.pool.take().is_some() {
            debug!(
                "PostgreSQL pool released: {}:{}",
                self.settings.host, self.settings.port
            );
        }
    }
}
