//! Schema model: column sanitization, table construction from sampled
//! rows, and backend-specific DDL generation.
//!
//! A [`TableSchema`] is built once per ingestion run from the first chunk
//! of data. It always carries a synthetic `id` identity column in first
//! position; source columns follow in their original order with sanitized
//! names and inferred types. The schema is an in-memory working copy plus
//! an audit record (see [`crate::history`]); the backend's own catalog
//! remains the source of truth.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, SemanticType},
    infer::infer_types,
};

/// SQL words that collide with common column names; sanitization appends
/// `_col` to these.
const RESERVED_WORDS: &[&str] = &[
    "index", "order", "group", "select", "from", "where", "table", "user",
];

/// Target engine for DDL generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::Sqlite => "sqlite",
        }
    }

    fn sql_type(&self, ty: SemanticType) -> &'static str {
        match self {
            BackendKind::Postgres => match ty {
                SemanticType::Integer => "BIGINT",
                SemanticType::Float => "DOUBLE PRECISION",
                SemanticType::Boolean => "BOOLEAN",
                SemanticType::DateTime => "TIMESTAMP",
                SemanticType::String => "VARCHAR(255)",
                SemanticType::Text => "TEXT",
            },
            BackendKind::Sqlite => match ty {
                SemanticType::Integer => "INTEGER",
                SemanticType::Float => "REAL",
                SemanticType::Boolean => "BOOLEAN",
                SemanticType::DateTime => "TEXT",
                SemanticType::String => "TEXT",
                SemanticType::Text => "TEXT",
            },
        }
    }

    fn identity_clause(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "BIGSERIAL PRIMARY KEY",
            BackendKind::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

/// Lower-cases, maps everything outside `[a-z0-9_]` to underscores,
/// collapses runs, trims edges, and suffixes reserved SQL words with
/// `_col`. Empty or all-digit names become `column`. Idempotent.
pub fn sanitize_column_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for c in name.trim().chars() {
        let mapped = match c {
            'a'..='z' | '0'..='9' => Some(c),
            'A'..='Z' => Some(c.to_ascii_lowercase()),
            _ => None,
        };
        match mapped {
            Some(c) => {
                sanitized.push(c);
                last_was_underscore = false;
            }
            None if last_was_underscore => {}
            None => {
                sanitized.push('_');
                last_was_underscore = true;
            }
        }
    }
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() || trimmed.chars().all(|c| c.is_ascii_digit()) {
        return "column".to_string();
    }
    if RESERVED_WORDS.contains(&trimmed) {
        return format!("{trimmed}_col");
    }
    trimmed.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub datatype: SemanticType,
    pub nullable: bool,
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: &str, datatype: SemanticType, nullable: bool) -> Self {
        Self {
            name: name.to_string(),
            datatype,
            nullable,
            primary_key: false,
            default: None,
        }
    }

    fn identity(name: &str) -> Self {
        Self {
            name: name.to_string(),
            datatype: SemanticType::Integer,
            nullable: false,
            primary_key: true,
            default: None,
        }
    }

    fn to_sql(&self, kind: BackendKind) -> String {
        if self.primary_key {
            return format!("\"{}\" {}", self.name, kind.identity_clause());
        }
        let mut parts = vec![
            format!("\"{}\"", self.name),
            kind.sql_type(self.datatype).to_string(),
        ];
        if !self.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &self.default {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub created_at: DateTime<Utc>,
}

impl TableSchema {
    pub const IDENTITY_COLUMN: &'static str = "id";

    /// Builds a schema from a sample of rows: runs type inference,
    /// sanitizes column names (deduplicating collisions with numeric
    /// suffixes), records nullability from observed nulls, and prepends
    /// the synthetic identity column. Never fails on malformed data.
    pub fn from_sample(table: &str, columns: &[String], rows: &[Vec<Cell>]) -> Self {
        let types = infer_types(columns, rows);
        Self::from_sample_with_types(table, columns, rows, &types)
    }

    /// Same as [`TableSchema::from_sample`] but reuses an already-inferred
    /// type mapping (the one attached to chunk 1 of a run).
    pub fn from_sample_with_types(
        table: &str,
        columns: &[String],
        rows: &[Vec<Cell>],
        types: &std::collections::BTreeMap<String, SemanticType>,
    ) -> Self {
        let mut defs = vec![ColumnDef::identity(Self::IDENTITY_COLUMN)];
        let mut seen = vec![Self::IDENTITY_COLUMN.to_string()];

        for (idx, raw_name) in columns.iter().enumerate() {
            let mut name = sanitize_column_name(raw_name);
            if seen.contains(&name) {
                let mut suffix = 2;
                while seen.contains(&format!("{name}_{suffix}")) {
                    suffix += 1;
                }
                name = format!("{name}_{suffix}");
            }
            seen.push(name.clone());

            let datatype = types.get(raw_name).copied().unwrap_or(SemanticType::String);
            let nullable = rows
                .iter()
                .any(|row| row.get(idx).is_none_or(|cell| cell.is_null()));
            defs.push(ColumnDef::new(&name, datatype, nullable));
        }

        TableSchema {
            name: table.to_string(),
            columns: defs,
            created_at: Utc::now(),
        }
    }

    /// Columns holding source data, i.e. everything but the identity key.
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn drop_ddl(&self, _kind: BackendKind) -> String {
        format!("DROP TABLE IF EXISTS \"{}\"", self.name)
    }

    pub fn create_ddl(&self, kind: BackendKind) -> String {
        let columns = self.columns.iter().map(|c| c.to_sql(kind)).join(", ");
        format!("CREATE TABLE \"{}\" ({columns})", self.name)
    }

    /// One `ALTER TABLE ... ADD COLUMN` per schema column absent from
    /// `existing_columns`, in schema order. Empty when nothing is new.
    /// Added columns are forced nullable so existing rows stay valid.
    pub fn alter_ddl(&self, existing_columns: &[String], kind: BackendKind) -> Vec<String> {
        self.columns
            .iter()
            .filter(|column| !column.primary_key)
            .filter(|column| !existing_columns.iter().any(|c| c == &column.name))
            .map(|column| {
                let mut relaxed = column.clone();
                relaxed.nullable = true;
                format!(
                    "ALTER TABLE \"{}\" ADD COLUMN {}",
                    self.name,
                    relaxed.to_sql(kind)
                )
            })
            .collect()
    }

    pub fn insert_sql(&self, kind: BackendKind) -> String {
        let columns = self.data_columns().map(|c| format!("\"{}\"", c.name)).join(", ");
        let placeholders = match kind {
            BackendKind::Postgres => (1..=self.data_columns().count())
                .map(|i| format!("${i}"))
                .join(", "),
            BackendKind::Sqlite => self.data_columns().map(|_| "?".to_string()).join(", "),
        };
        format!(
            "INSERT INTO \"{}\" ({columns}) VALUES ({placeholders})",
            self.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;

    fn sample_schema() -> TableSchema {
        let columns = vec!["Employee Name!".to_string(), "Salary".to_string()];
        let rows = vec![
            vec![Cell::Text("Alice".into()), Cell::Text("50000".into())],
            vec![Cell::Text("Bob".into()), Cell::Null],
        ];
        TableSchema::from_sample("staff", &columns, &rows)
    }

    #[test]
    fn sanitize_lowercases_and_collapses() {
        assert_eq!(sanitize_column_name("Employee Name!"), "employee_name");
        assert_eq!(sanitize_column_name("  Unit Price (THB)  "), "unit_price_thb");
        assert_eq!(sanitize_column_name("already_clean"), "already_clean");
    }

    #[test]
    fn sanitize_suffixes_reserved_words() {
        assert_eq!(sanitize_column_name("order"), "order_col");
        assert_eq!(sanitize_column_name("SELECT"), "select_col");
        assert_eq!(sanitize_column_name("orders"), "orders");
    }

    #[test]
    fn sanitize_handles_empty_and_numeric_names() {
        assert_eq!(sanitize_column_name(""), "column");
        assert_eq!(sanitize_column_name("???"), "column");
        assert_eq!(sanitize_column_name("2024"), "column");
    }

    #[test]
    fn identity_column_comes_first_and_is_unique() {
        let schema = sample_schema();
        assert_eq!(schema.columns[0].name, "id");
        assert!(schema.columns[0].primary_key);
        assert_eq!(
            schema.columns.iter().filter(|c| c.primary_key).count(),
            1
        );
    }

    #[test]
    fn nullability_tracks_observed_nulls() {
        let schema = sample_schema();
        let name = &schema.columns[1];
        let salary = &schema.columns[2];
        assert!(!name.nullable);
        assert!(salary.nullable);
    }

    #[test]
    fn colliding_sanitized_names_get_numeric_suffixes() {
        let columns = vec!["Amount".to_string(), "amount!".to_string()];
        let rows = vec![vec![Cell::Text("1".into()), Cell::Text("2".into())]];
        let schema = TableSchema::from_sample("t", &columns, &rows);
        let names = schema.column_names();
        assert_eq!(names, vec!["id", "amount", "amount_2"]);
    }

    #[test]
    fn create_ddl_differs_per_backend() {
        let schema = sample_schema();
        let pg = schema.create_ddl(BackendKind::Postgres);
        let lite = schema.create_ddl(BackendKind::Sqlite);
        assert!(pg.starts_with("CREATE TABLE \"staff\""));
        assert!(pg.contains("\"id\" BIGSERIAL PRIMARY KEY"));
        assert!(pg.contains("\"employee_name\" VARCHAR(255) NOT NULL"));
        assert!(lite.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(lite.contains("\"employee_name\" TEXT NOT NULL"));
    }

    #[test]
    fn alter_ddl_emits_only_missing_columns_in_order() {
        let schema = sample_schema();
        let existing = vec!["id".to_string(), "employee_name".to_string()];
        let statements = schema.alter_ddl(&existing, BackendKind::Sqlite);
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0],
            "ALTER TABLE \"staff\" ADD COLUMN \"salary\" INTEGER"
        );

        let complete = schema.column_names();
        assert!(schema.alter_ddl(&complete, BackendKind::Sqlite).is_empty());
    }

    #[test]
    fn insert_sql_numbers_postgres_placeholders() {
        let schema = sample_schema();
        assert_eq!(
            schema.insert_sql(BackendKind::Postgres),
            "INSERT INTO \"staff\" (\"employee_name\", \"salary\") VALUES ($1, $2)"
        );
        assert_eq!(
            schema.insert_sql(BackendKind::Sqlite),
            "INSERT INTO \"staff\" (\"employee_name\", \"salary\") VALUES (?, ?)"
        );
    }
}
