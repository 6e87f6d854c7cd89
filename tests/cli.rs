mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::*;
use rusqlite::Connection;

#[test]
fn mock_command_loads_rows_into_the_fallback_store() {
    let workspace = TestWorkspace::new();
    let db_path = workspace.path().join("cli_fallback.db");
    let history_path = workspace.path().join("history.json");

    Command::cargo_bin("sheetload")
        .expect("binary")
        .args([
            "mock",
            "--template",
            "employees",
            "--rows",
            "30",
            "--seed",
            "1",
            "--table",
            "staff",
            "--chunk-size",
            "10",
            "--fallback-only",
            "--sqlite-path",
            db_path.to_str().unwrap(),
            "--history-file",
            history_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let conn = Connection::open(&db_path).expect("open fallback db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM \"staff\"", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 30);

    Command::cargo_bin("sheetload")
        .expect("binary")
        .args([
            "history",
            "--history-file",
            history_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("staff"));
}

#[test]
fn ingest_command_imports_a_csv_file() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "orders.csv",
        "Order Id,Amount\n1,10.5\n2,11.0\n3,12.25\n",
    );
    let db_path = workspace.path().join("cli_fallback.db");

    Command::cargo_bin("sheetload")
        .expect("binary")
        .args([
            "ingest",
            "-i",
            input.to_str().unwrap(),
            "--fallback-only",
            "--sqlite-path",
            db_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let conn = Connection::open(&db_path).expect("open fallback db");
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM \"orders\"", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 3);
}

#[test]
fn missing_input_file_exits_nonzero() {
    let workspace = TestWorkspace::new();
    Command::cargo_bin("sheetload")
        .expect("binary")
        .args([
            "ingest",
            "-i",
            workspace.path().join("absent.xlsx").to_str().unwrap(),
            "--fallback-only",
            "--sqlite-path",
            workspace.path().join("db.sqlite").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn unknown_template_exits_nonzero() {
    let workspace = TestWorkspace::new();
    Command::cargo_bin("sheetload")
        .expect("binary")
        .args([
            "mock",
            "--template",
            "customers",
            "--fallback-only",
            "--sqlite-path",
            workspace.path().join("db.sqlite").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown mock template"));
}
