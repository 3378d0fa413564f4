//! 集成测试共用的假连接与错误钩子
#![allow(dead_code)]

use logutils::core::LogRecord;
use logutils::sinks::database::{Connection, Cursor, DbError, DbResult, ParamStyle, SqlValue};
use logutils::sinks::ErrorHook;
use logutils::LogUtilsError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// 记录所有执行语句的假连接
#[derive(Debug, Default)]
pub struct RecordingConnection {
    pub statements: Mutex<Vec<(String, Vec<SqlValue>)>>,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub fail_execute: AtomicBool,
    pub columns: Option<Vec<String>>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 能够描述表结构的连接
    pub fn with_columns(columns: &[&str]) -> Self {
        Self {
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_execute.store(failing, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<Vec<SqlValue>> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn insert_count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

struct RecordingCursor<'a> {
    conn: &'a RecordingConnection,
}

impl Cursor for RecordingCursor<'_> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        if self.conn.fail_execute.load(Ordering::SeqCst) {
            return Err(DbError::Connectivity("connection reset by peer".to_string()));
        }
        self.conn
            .statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(1)
    }
}

impl Connection for RecordingConnection {
    fn cursor(&self) -> DbResult<Box<dyn Cursor + '_>> {
        Ok(Box::new(RecordingCursor { conn: self }))
    }

    fn commit(&self) -> DbResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> DbResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Qmark
    }

    fn table_columns(&self, _table: &str) -> DbResult<Option<Vec<String>>> {
        Ok(self.columns.clone())
    }
}

/// 收集错误报告的钩子
#[derive(Debug, Default)]
pub struct RecordingHook {
    pub reports: Mutex<Vec<(String, String)>>,
}

impl ErrorHook for RecordingHook {
    fn handle_error(&self, handler: &str, record: &LogRecord, error: &LogUtilsError) {
        self.reports
            .lock()
            .unwrap()
            .push((handler.to_string(), format!("{} ({})", error, record.message)));
    }
}
