//! 设置函数集成测试：表结构校验、文件 logger、全局注册表便捷函数

mod common;

use common::RecordingConnection;
use logutils::setup::setup_database_logger;
use logutils::{
    ColumnMapping, ColumnOverrides, ColumnSpec, DatabaseLoggerOptions, FileLoggerOptions, FileMode,
    Level, LogUtilsError, LoggerRegistry,
};
use std::sync::Arc;
use tempfile::TempDir;

const DEFAULT_COLUMNS: [&str; 10] = [
    "log_id", "date", "logger", "module", "file", "line", "level", "level_name", "message", "traceback",
];

#[test]
fn test_schema_mismatch_fails_fast() {
    let registry = LoggerRegistry::new();
    let conn = Arc::new(RecordingConnection::with_columns(&["log_id", "date", "message"]));

    let err = setup_database_logger(&registry, conn, "legacy_logs", DatabaseLoggerOptions::new().name("legacy"))
        .unwrap_err();
    match err {
        LogUtilsError::SchemaMismatch { ref table, ref missing } => {
            assert_eq!(table, "legacy_logs");
            assert!(missing.contains(&"traceback".to_string()));
        }
        ref other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().starts_with("Table 'legacy_logs' is missing columns:"));
    assert!(registry.get_logger(Some("legacy")).handlers().is_empty());
}

#[test]
fn test_schema_match_with_renamed_columns() {
    let registry = LoggerRegistry::new();
    let mut columns: Vec<&str> = DEFAULT_COLUMNS.to_vec();
    columns[8] = "msg";
    columns.push("thread");
    let conn = Arc::new(RecordingConnection::with_columns(&columns));

    let overrides = ColumnOverrides::new()
        .set_by_name("message", ColumnSpec::new().name("msg"))
        .unwrap()
        .set_by_name("thread", ColumnSpec::new())
        .unwrap();
    let logger = setup_database_logger(
        &registry,
        conn.clone(),
        "logs",
        DatabaseLoggerOptions::new()
            .name("renamed")
            .columns(ColumnMapping::from_overrides(&overrides).unwrap()),
    )
    .unwrap();

    logger.info("hello");
    let statements = conn.statements.lock().unwrap();
    assert_eq!(statements.len(), 1);
    assert!(statements[0].0.contains(", msg, traceback, thread)"));
    assert_eq!(statements[0].1.len(), 10);
}

#[test]
fn test_invalid_table_name_is_rejected() {
    let registry = LoggerRegistry::new();
    let conn = Arc::new(RecordingConnection::new());
    for table in ["", "logs; DROP TABLE users", "1logs", "a.b.c"] {
        let err = setup_database_logger(&registry, conn.clone(), table, DatabaseLoggerOptions::new())
            .unwrap_err();
        assert!(matches!(err, LogUtilsError::InvalidArgument(_)), "{}", table);
    }
    assert!(registry.root().handlers().is_empty());
}

#[test]
fn test_file_logger_through_global_registry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("global.log");

    let logger = logutils::setup_file_logger(
        &path,
        FileLoggerOptions::new()
            .name("it.setup.global_file")
            .mode(FileMode::Truncate)
            .level(Level::Warning)
            .format("{name} {levelname} {message}"),
    )
    .unwrap();
    assert!(Arc::ptr_eq(&logger, &logutils::get_logger(Some("it.setup.global_file"))));

    logger.info("skipped");
    logger.warning("kept");
    logutils::get_logger(Some("it.setup.global_file.child")).error("from child");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents,
        "it.setup.global_file WARNING kept\nit.setup.global_file.child ERROR from child\n"
    );
}

#[test]
fn test_file_logger_unwritable_path() {
    let dir = TempDir::new().unwrap();
    let registry = LoggerRegistry::new();
    let err = logutils::setup::setup_file_logger(
        &registry,
        dir.path().join("no_such_dir").join("x.log"),
        FileLoggerOptions::new(),
    )
    .unwrap_err();
    assert!(matches!(err, LogUtilsError::IoError { .. }));
    assert!(err.is_recoverable());
}
