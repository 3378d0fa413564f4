//! 日志记录定义
//!
//! `LogRecord` 是 logger 派发给各个 handler 的结构化事件。记录一经构建便不再修改，
//! 每个挂载的 handler 最多消费一次。

use crate::core::level::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;

/// 日志记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// 事件时间戳（UTC）
    pub timestamp: DateTime<Utc>,
    /// 日志级别
    pub level: Level,
    /// 产生记录的 logger 名称
    pub logger: String,
    /// 渲染后的日志消息
    pub message: String,
    /// 模块路径
    pub module_path: Option<String>,
    /// 源文件
    pub file: Option<String>,
    /// 行号
    pub line: Option<u32>,
    /// 线程名
    pub thread_name: Option<String>,
    /// 进程 ID
    pub process_id: u32,
    /// 异常（错误链）信息
    pub exception: Option<ExceptionInfo>,
    /// 结构化字段
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// 错误链的文本表示
///
/// 第一行是错误本身，后续每一行对应 `source()` 链上的一个原因。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub lines: Vec<String>,
}

impl ExceptionInfo {
    /// 从错误及其 `source()` 链构建
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut lines = vec![format!("Error: {}", error)];
        let mut source = error.source();
        while let Some(cause) = source {
            lines.push(format!("Caused by: {}", cause));
            source = cause.source();
        }
        Self { lines }
    }

    /// 多行文本，供文本格式化器附加在消息之后
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    /// 单行文本，各行以 `|` 连接，写入数据库 `traceback` 列
    pub fn to_single_line(&self) -> String {
        self.lines.join("|")
    }
}

impl LogRecord {
    /// 创建新的日志记录，时间戳、线程和进程信息取自当前调用环境
    pub fn new(logger: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            message: message.into(),
            module_path: None,
            file: None,
            line: None,
            thread_name: std::thread::current().name().map(str::to_string),
            process_id: std::process::id(),
            exception: None,
            fields: BTreeMap::new(),
        }
    }

    /// 设置源代码位置
    pub fn with_location(mut self, file: Option<&str>, line: Option<u32>) -> Self {
        self.file = file.map(str::to_string);
        self.line = line;
        self
    }

    /// 设置模块路径
    pub fn with_module_path(mut self, module_path: Option<&str>) -> Self {
        self.module_path = module_path.map(str::to_string);
        self
    }

    /// 附加错误链
    pub fn with_exception(mut self, error: &(dyn StdError + 'static)) -> Self {
        self.exception = Some(ExceptionInfo::from_error(error));
        self
    }

    /// 添加结构化字段
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// 源文件名（不含目录）
    pub fn file_name(&self) -> Option<&str> {
        self.file
            .as_deref()
            .map(|path| path.rsplit(['/', '\\']).next().unwrap_or(path))
    }

    /// 模块名：模块路径的最后一段
    pub fn module(&self) -> Option<&str> {
        self.module_path
            .as_deref()
            .map(|path| path.rsplit("::").next().unwrap_or(path))
    }

    /// 获取记录的 JSON 表示
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl StdError for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "query failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_record_creation() {
        let record = LogRecord::new("app.db", Level::Info, "Test message")
            .with_location(Some("src/app/db.rs"), Some(42))
            .with_module_path(Some("app::db"));

        assert_eq!(record.level, Level::Info);
        assert_eq!(record.logger, "app.db");
        assert_eq!(record.message, "Test message");
        assert_eq!(record.file_name(), Some("db.rs"));
        assert_eq!(record.module(), Some("db"));
        assert_eq!(record.line, Some(42));
        assert_eq!(record.process_id, std::process::id());
    }

    #[test]
    fn test_exception_chain() {
        let record = LogRecord::new("app", Level::Error, "failed").with_exception(&Outer(Inner));
        let exception = record.exception.unwrap();

        assert_eq!(
            exception.lines,
            vec!["Error: query failed", "Caused by: connection reset"]
        );
        assert_eq!(
            exception.to_single_line(),
            "Error: query failed|Caused by: connection reset"
        );
    }

    #[test]
    fn test_json_serialization() {
        let record = LogRecord::new("app", Level::Warning, "disk almost full")
            .with_field("free_mb", serde_json::json!(12));
        let json = record.to_json().unwrap();

        assert!(json.contains("\"level\":\"WARNING\""));
        assert!(json.contains("\"free_mb\":12"));
    }
}
