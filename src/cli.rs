use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Load spreadsheets and mock datasets into SQL stores", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a spreadsheet file (.xlsx, .xls, .xlsm, .csv, .tsv) into a table
    Ingest(IngestArgs),
    /// Generate a mock dataset and load it into a table
    Mock(MockArgs),
    /// Show the schema-change audit log
    History(HistoryArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Input spreadsheet file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Sheet to read (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Character encoding for delimited input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Target table name (defaults to the sanitized file stem)
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    #[command(flatten)]
    pub database: DatabaseArgs,
    #[command(flatten)]
    pub processing: ProcessingArgs,
}

#[derive(Debug, Args)]
pub struct MockArgs {
    /// Data template: employees, sales, inventory, financial, or custom
    #[arg(long, default_value = "employees")]
    pub template: String,
    /// Number of rows to generate
    #[arg(long, default_value_t = 1000)]
    pub rows: usize,
    /// RNG seed for reproducible datasets
    #[arg(long)]
    pub seed: Option<u64>,
    /// Target table name (defaults to mock_<template>_<timestamp>)
    #[arg(short = 't', long = "table")]
    pub table: Option<String>,
    #[command(flatten)]
    pub database: DatabaseArgs,
    #[command(flatten)]
    pub processing: ProcessingArgs,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Path of the schema audit log
    #[arg(long = "history-file", default_value = "schema_history.json")]
    pub history_file: PathBuf,
    /// Only show entries for this table
    #[arg(long)]
    pub table: Option<String>,
    /// Maximum number of entries to display (newest last)
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct DatabaseArgs {
    /// PostgreSQL host of the primary backend (omit to use the fallback only)
    #[arg(long = "pg-host")]
    pub pg_host: Option<String>,
    /// PostgreSQL port
    #[arg(long = "pg-port", default_value_t = 5432)]
    pub pg_port: u16,
    /// PostgreSQL database name
    #[arg(long = "pg-database", default_value = "postgres")]
    pub pg_database: String,
    /// PostgreSQL user
    #[arg(long = "pg-user", default_value = "postgres")]
    pub pg_user: String,
    /// PostgreSQL password
    #[arg(long = "pg-password", default_value = "")]
    pub pg_password: String,
    /// Connection pool size for the primary backend
    #[arg(long = "pool-size", default_value_t = 3)]
    pub pool_size: u32,
    /// Connection timeout in seconds
    #[arg(long = "connect-timeout", default_value_t = 10)]
    pub connect_timeout: u64,
    /// SQLite file used by the embedded fallback backend
    #[arg(long = "sqlite-path", default_value = "sheetload_fallback.db")]
    pub sqlite_path: PathBuf,
    /// Skip the primary backend entirely
    #[arg(long = "fallback-only")]
    pub fallback_only: bool,
    /// Append schema changes to this JSON audit log
    #[arg(long = "history-file")]
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProcessingArgs {
    /// Rows per source chunk
    #[arg(long = "chunk-size", default_value_t = 1000)]
    pub chunk_size: usize,
    /// Rows per insert batch inside the backend
    #[arg(long = "batch-size", default_value_t = 200)]
    pub batch_size: usize,
    /// Evolve an existing table instead of dropping and recreating it
    #[arg(long)]
    pub append: bool,
}
