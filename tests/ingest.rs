mod common;

use std::sync::{
    Arc, Mutex,
    atomic::Ordering,
};

use common::{StubBackend, StubProbe, TestWorkspace};
use rusqlite::Connection;
use sheetload::error::IngestError;
use sheetload::hybrid::HybridManager;
use sheetload::ingest::{
    Coordinator, DatabaseSettings, IngestConfig, ProcessingConfig, SourceConfig, TableMode,
};
use sheetload::mock::MockTemplate;
use sheetload::schema::BackendKind;
use sheetload::sqlite::SqliteBackend;

fn mock_config(rows: usize, chunk_size: usize, sqlite_path: std::path::PathBuf) -> IngestConfig {
    IngestConfig {
        source: SourceConfig::Mock {
            template: MockTemplate::Employees,
            rows,
            seed: Some(11),
        },
        table_name: "staff".to_string(),
        database: DatabaseSettings {
            postgres: None,
            sqlite_path,
        },
        processing: ProcessingConfig {
            chunk_size,
            batch_size: 100,
        },
        mode: TableMode::Replace,
        history_file: None,
    }
}

fn stub_manager(probe: &StubProbe) -> HybridManager {
    HybridManager::fallback_only(Box::new(StubBackend::healthy(
        BackendKind::Sqlite,
        probe.clone(),
    )))
}

#[test]
fn end_to_end_mock_employees_into_sqlite_fallback() {
    let workspace = TestWorkspace::new();
    let db_path = workspace.path().join("fallback.db");
    let mut config = mock_config(100, 50, db_path.clone());
    config.history_file = Some(workspace.path().join("schema_history.json"));

    // Primary is unreachable, so the run must downgrade to the embedded
    // store and still succeed.
    let primary = StubBackend::unreachable(BackendKind::Postgres, StubProbe::new());
    let manager = HybridManager::new(
        Box::new(primary),
        Box::new(SqliteBackend::new(&db_path)),
    );

    let result = Coordinator::with_manager(config, manager).run();
    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.rows_processed, 100);
    assert_eq!(result.backend_used, "fallback");
    assert_eq!(result.table_name, "staff");

    let conn = Connection::open(&db_path).expect("open fallback db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM \"staff\"", [], |row| row.get(0))
        .expect("count rows");
    assert_eq!(count, 100);

    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('staff')")
        .expect("table info");
    let columns: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("query columns")
        .collect::<Result<_, _>>()
        .expect("collect columns");
    assert_eq!(columns[0], "id");
    for field in [
        "employee_id",
        "first_name",
        "last_name",
        "email",
        "department",
        "position",
        "salary",
        "hire_date",
        "status",
        "phone",
        "age",
        "city",
        "province",
        "performance_rating",
        "years_of_experience",
        "active",
        "created_at",
    ] {
        assert!(columns.iter().any(|c| c == field), "missing column {field}");
    }

    // Identity values are assigned by the engine, never sourced from data.
    let max_id: i64 = conn
        .query_row("SELECT MAX(id) FROM \"staff\"", [], |row| row.get(0))
        .expect("max id");
    assert_eq!(max_id, 100);
}

#[test]
fn spreadsheet_csv_ingestion_round_trips_types() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "people.csv",
        "Full Name,Score,Joined,Active\n\
         Alice,10,2024-01-05,1\n\
         Bob,12.5,2024-02-06,0\n\
         Cara,9,2024-03-07,1\n",
    );
    let db_path = workspace.path().join("fallback.db");

    let config = IngestConfig {
        source: SourceConfig::Spreadsheet {
            path: input,
            sheet: None,
            encoding: None,
        },
        table_name: "people".to_string(),
        database: DatabaseSettings {
            postgres: None,
            sqlite_path: db_path.clone(),
        },
        processing: ProcessingConfig {
            chunk_size: 2,
            batch_size: 10,
        },
        mode: TableMode::Replace,
        history_file: None,
    };

    let result = Coordinator::new(config).run();
    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.rows_processed, 3);

    let conn = Connection::open(&db_path).expect("open db");
    let score: f64 = conn
        .query_row(
            "SELECT score FROM \"people\" WHERE full_name = 'Bob'",
            [],
            |row| row.get(0),
        )
        .expect("score");
    assert!((score - 12.5).abs() < f64::EPSILON);
    let active: i64 = conn
        .query_row(
            "SELECT active FROM \"people\" WHERE full_name = 'Alice'",
            [],
            |row| row.get(0),
        )
        .expect("active");
    assert_eq!(active, 1);
}

#[test]
fn cancellation_stops_at_the_next_chunk_boundary() {
    let workspace = TestWorkspace::new();
    let probe = StubProbe::new();
    let config = mock_config(50, 10, workspace.path().join("unused.db"));

    let coordinator = Coordinator::with_manager(config, stub_manager(&probe));
    let cancel = coordinator.cancel_handle();
    // Progress reaches 54% exactly when chunk 2 of 5 has landed.
    let coordinator = coordinator.on_progress(move |update| {
        if update.percent >= 54.0 && update.percent < 90.0 {
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let result = coordinator.run();
    assert!(!result.success);
    assert!(result.was_cancelled());
    assert_eq!(result.rows_processed, 20);
    assert_eq!(probe.chunks_inserted.load(Ordering::SeqCst), 2);
    assert!(probe.closed.load(Ordering::SeqCst), "connection not released");
}

#[test]
fn connect_failure_produces_terminal_failed_result() {
    let workspace = TestWorkspace::new();
    let config = mock_config(10, 5, workspace.path().join("unused.db"));
    let manager = HybridManager::new(
        Box::new(StubBackend::unreachable(
            BackendKind::Postgres,
            StubProbe::new(),
        )),
        Box::new(StubBackend::unreachable(
            BackendKind::Sqlite,
            StubProbe::new(),
        )),
    );

    let result = Coordinator::with_manager(config, manager).run();
    assert!(!result.success);
    assert_eq!(result.rows_processed, 0);
    assert_eq!(result.backend_used, "none");
    assert!(matches!(result.error, Some(IngestError::Connection)));
}

#[test]
fn missing_input_file_fails_during_preparation() {
    let workspace = TestWorkspace::new();
    let probe = StubProbe::new();
    let config = IngestConfig {
        source: SourceConfig::Spreadsheet {
            path: workspace.path().join("absent.xlsx"),
            sheet: None,
            encoding: None,
        },
        table_name: "absent".to_string(),
        database: DatabaseSettings {
            postgres: None,
            sqlite_path: workspace.path().join("unused.db"),
        },
        processing: ProcessingConfig::default(),
        mode: TableMode::Replace,
        history_file: None,
    };

    let result = Coordinator::with_manager(config, stub_manager(&probe)).run();
    assert!(!result.success);
    assert!(matches!(result.error, Some(IngestError::Source(_))));
    assert!(probe.closed.load(Ordering::SeqCst), "connection not released");
}

#[test]
fn short_insert_counts_surface_as_insert_failure() {
    let workspace = TestWorkspace::new();
    let probe = StubProbe::new();
    let backend =
        StubBackend::healthy(BackendKind::Sqlite, probe.clone()).with_short_inserts(1);
    let manager = HybridManager::fallback_only(Box::new(backend));
    let config = mock_config(10, 10, workspace.path().join("unused.db"));

    let result = Coordinator::with_manager(config, manager).run();
    assert!(!result.success);
    match result.error {
        Some(IngestError::InsertFailure {
            expected, inserted, ..
        }) => {
            assert_eq!(expected, 10);
            assert_eq!(inserted, 9);
        }
        other => panic!("expected InsertFailure, got {other:?}"),
    }
    assert!(probe.closed.load(Ordering::SeqCst));
}

#[test]
fn panicking_progress_callback_does_not_sink_the_run() {
    let workspace = TestWorkspace::new();
    let probe = StubProbe::new();
    let config = mock_config(10, 5, workspace.path().join("unused.db"));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_cb = Arc::clone(&seen);
    let result = Coordinator::with_manager(config, stub_manager(&probe))
        .on_progress(move |update| {
            seen_in_cb.lock().unwrap().push(update.percent);
            panic!("ui thread went away");
        })
        .run();

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.rows_processed, 10);
    assert!(!seen.lock().unwrap().is_empty());
}

#[test]
fn history_log_records_table_creation() {
    let workspace = TestWorkspace::new();
    let probe = StubProbe::new();
    let history_path = workspace.path().join("audit.json");
    let mut config = mock_config(10, 5, workspace.path().join("unused.db"));
    config.history_file = Some(history_path.clone());

    let result = Coordinator::with_manager(config, stub_manager(&probe)).run();
    assert!(result.success);

    let history = sheetload::history::SchemaHistory::new(&history_path);
    let entries = history.load().expect("load history");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].table_name, "staff");
    assert_eq!(entries[0].action, sheetload::history::SchemaAction::Create);
}
