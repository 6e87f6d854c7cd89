pub mod backend;
pub mod cli;
pub mod data;
pub mod error;
pub mod history;
pub mod hybrid;
pub mod infer;
pub mod ingest;
pub mod io_utils;
pub mod mock;
pub mod postgres;
pub mod schema;
pub mod source;
pub mod sqlite;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::info;

use crate::{
    cli::{Cli, Commands, DatabaseArgs, HistoryArgs, IngestArgs, MockArgs, ProcessingArgs},
    history::SchemaHistory,
    ingest::{
        Coordinator, DatabaseSettings, IngestConfig, IngestionResult, ProcessingConfig,
        SourceConfig, TableMode,
    },
    mock::MockTemplate,
    postgres::PostgresSettings,
    schema::sanitize_column_name,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheetload", log::LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Mock(args) => handle_mock(&args),
        Commands::History(args) => handle_history(&args),
    }
}

fn handle_ingest(args: &IngestArgs) -> Result<()> {
    let table = match &args.table {
        Some(name) => name.clone(),
        None => {
            let stem = args
                .input
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("imported_data");
            sanitize_column_name(stem)
        }
    };
    info!(
        "Ingesting '{}' into table '{table}'",
        args.input.display()
    );

    let config = IngestConfig {
        source: SourceConfig::Spreadsheet {
            path: args.input.clone(),
            sheet: args.sheet.clone(),
            encoding: args.input_encoding.clone(),
        },
        table_name: table,
        database: database_settings(&args.database),
        processing: processing_config(&args.processing),
        mode: table_mode(&args.processing),
        history_file: args.database.history_file.clone(),
    };
    execute_run(config)
}

fn handle_mock(args: &MockArgs) -> Result<()> {
    let template: MockTemplate = args.template.parse()?;
    let table = match &args.table {
        Some(name) => name.clone(),
        None => format!(
            "mock_{}_{}",
            template.as_str(),
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ),
    };
    info!(
        "Generating {} row(s) of '{}' data into table '{table}'",
        args.rows,
        template.as_str()
    );

    let config = IngestConfig {
        source: SourceConfig::Mock {
            template,
            rows: args.rows,
            seed: args.seed,
        },
        table_name: table,
        database: database_settings(&args.database),
        processing: processing_config(&args.processing),
        mode: table_mode(&args.processing),
        history_file: args.database.history_file.clone(),
    };
    execute_run(config)
}

fn handle_history(args: &HistoryArgs) -> Result<()> {
    let history = SchemaHistory::new(&args.history_file);
    let entries = history
        .load()
        .with_context(|| format!("Loading schema history from {:?}", args.history_file))?;
    let filtered: Vec<_> = entries
        .iter()
        .filter(|entry| {
            args.table
                .as_deref()
                .is_none_or(|table| entry.table_name == table)
        })
        .collect();

    if filtered.is_empty() {
        info!("No schema history entries in {:?}", args.history_file);
        return Ok(());
    }
    let start = filtered.len().saturating_sub(args.limit);
    for entry in &filtered[start..] {
        println!(
            "{}  {:6}  {}  ({} column(s))",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action.as_str(),
            entry.table_name,
            entry.columns.len()
        );
    }
    Ok(())
}

fn execute_run(config: IngestConfig) -> Result<()> {
    let result: IngestionResult = Coordinator::new(config)
        .on_progress(|update| info!("[{:>3.0}%] {}", update.percent, update.message))
        .run();

    if result.success {
        info!(
            "Loaded {} row(s) into '{}' via {} backend in {:.2}s",
            result.rows_processed, result.table_name, result.backend_used, result.duration_seconds
        );
        Ok(())
    } else {
        let reason = result
            .error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        Err(anyhow!(
            "Ingestion into '{}' failed after {} row(s): {reason}",
            result.table_name,
            result.rows_processed
        ))
    }
}

fn database_settings(args: &DatabaseArgs) -> DatabaseSettings {
    let postgres = if args.fallback_only {
        None
    } else {
        args.pg_host.as_ref().map(|host| PostgresSettings {
            host: host.clone(),
            port: args.pg_port,
            database: args.pg_database.clone(),
            user: args.pg_user.clone(),
            password: args.pg_password.clone(),
            pool_size: args.pool_size,
            connect_timeout_secs: args.connect_timeout,
            recycle_secs: PostgresSettings::default().recycle_secs,
        })
    };
    DatabaseSettings {
        postgres,
        sqlite_path: args.sqlite_path.clone(),
    }
}

fn processing_config(args: &ProcessingArgs) -> ProcessingConfig {
    ProcessingConfig {
        chunk_size: args.chunk_size.max(1),
        batch_size: args.batch_size.max(1),
    }
}

fn table_mode(args: &ProcessingArgs) -> TableMode {
    if args.append {
        TableMode::Append
    } else {
        TableMode::Replace
    }
}
