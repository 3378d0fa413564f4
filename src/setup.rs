//! Logger 设置辅助函数
//!
//! 每个函数构造一个 handler，挂载到指定名称的 logger（未指定时为 root）上并返回该 logger。
//! 配置错误在调用时立即返回；之后的写入错误由 logger 派发交给错误钩子。
//!
//! 每次调用都会挂载一个新的 handler，对同一个 logger 调用两次会得到两个 handler。

use crate::core::formatter::{Formatter, PatternFormatter, DEFAULT_FORMAT, DEFAULT_TIME_FORMAT};
use crate::core::level::Level;
use crate::core::logger::{Logger, LoggerRegistry};
use crate::error::Result;
use crate::sinks::database::connection::Connection;
use crate::sinks::database::handler::{ColumnMapping, DatabaseHandler};
use crate::sinks::file::{FileHandler, FileMode};
use crate::sinks::stream::{StreamHandler, StreamTarget};
use crate::sinks::traits::Handler;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// 设置函数默认为 logger 自身设置的级别
pub const DEFAULT_LOGGER_LEVEL: Level = Level::Debug;

/// 数据库 logger 选项
#[derive(Debug, Clone)]
pub struct DatabaseLoggerOptions {
    /// logger 名称，`None` 表示 root
    pub name: Option<String>,
    /// handler 级别
    pub level: Level,
    /// 同时设置的 logger 级别，`None` 表示不修改
    pub logger_level: Option<Level>,
    /// 列映射
    pub columns: ColumnMapping,
    /// `message` 列的格式化器
    pub message_formatter: Option<Arc<dyn Formatter>>,
}

impl Default for DatabaseLoggerOptions {
    fn default() -> Self {
        Self {
            name: None,
            level: Level::Info,
            logger_level: Some(DEFAULT_LOGGER_LEVEL),
            columns: ColumnMapping::default(),
            message_formatter: None,
        }
    }
}

impl DatabaseLoggerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn logger_level(mut self, level: Option<Level>) -> Self {
        self.logger_level = level;
        self
    }

    pub fn columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    pub fn message_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.message_formatter = Some(formatter);
        self
    }
}

/// 文件 logger 选项
#[derive(Debug, Clone)]
pub struct FileLoggerOptions {
    pub name: Option<String>,
    pub level: Level,
    pub logger_level: Option<Level>,
    /// 打开模式
    pub mode: FileMode,
    /// 行模板
    pub format: String,
    /// `{asctime}` 的时间格式
    pub time_format: String,
}

impl Default for FileLoggerOptions {
    fn default() -> Self {
        Self {
            name: None,
            level: Level::Info,
            logger_level: Some(DEFAULT_LOGGER_LEVEL),
            mode: FileMode::default(),
            format: DEFAULT_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl FileLoggerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn logger_level(mut self, level: Option<Level>) -> Self {
        self.logger_level = level;
        self
    }

    pub fn mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }
}

/// 流 logger 选项
#[derive(Debug, Clone)]
pub struct StreamLoggerOptions {
    pub name: Option<String>,
    pub level: Level,
    pub logger_level: Option<Level>,
    pub format: String,
    /// 为级别名称着色
    pub color: bool,
}

impl Default for StreamLoggerOptions {
    fn default() -> Self {
        Self {
            name: None,
            level: Level::Info,
            logger_level: Some(DEFAULT_LOGGER_LEVEL),
            format: DEFAULT_FORMAT.to_string(),
            color: false,
        }
    }
}

impl StreamLoggerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn logger_level(mut self, level: Option<Level>) -> Self {
        self.logger_level = level;
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }
}

fn attach(
    registry: &LoggerRegistry,
    name: Option<&str>,
    logger_level: Option<Level>,
    handler: Arc<dyn Handler>,
) -> Arc<Logger> {
    let logger = registry.get_logger(name);
    if let Some(level) = logger_level {
        logger.set_level(level);
    }
    debug!(
        logger = logger.name(),
        handler = %handler.metadata().name,
        level = %handler.level(),
        "handler attached"
    );
    logger.add_handler(handler);
    logger
}

/// 挂载数据库 handler
///
/// 不检查连通性。连接能够描述表结构时，缺少映射列会返回 `SchemaMismatch`。
pub fn setup_database_logger<C>(
    registry: &LoggerRegistry,
    connection: Arc<C>,
    table: &str,
    options: DatabaseLoggerOptions,
) -> Result<Arc<Logger>>
where
    C: Connection + ?Sized + 'static,
{
    let mut builder = DatabaseHandler::builder(connection, table)
        .columns(options.columns)
        .level(options.level);
    if let Some(formatter) = options.message_formatter {
        builder = builder.message_formatter(formatter);
    }
    let handler = builder.build()?;
    handler.check_table_columns()?;

    Ok(attach(
        registry,
        options.name.as_deref(),
        options.logger_level,
        Arc::new(handler),
    ))
}

/// 挂载文件 handler
pub fn setup_file_logger(
    registry: &LoggerRegistry,
    path: impl AsRef<Path>,
    options: FileLoggerOptions,
) -> Result<Arc<Logger>> {
    let formatter = PatternFormatter::new(&options.format)?.with_time_format(options.time_format)?;
    let handler = FileHandler::new(path, options.mode, options.level)?.with_formatter(Arc::new(formatter));

    Ok(attach(
        registry,
        options.name.as_deref(),
        options.logger_level,
        Arc::new(handler),
    ))
}

/// 挂载流 handler，`stream` 为 `None` 时写标准错误
pub fn setup_stream_logger(
    registry: &LoggerRegistry,
    stream: Option<StreamTarget>,
    options: StreamLoggerOptions,
) -> Result<Arc<Logger>> {
    let formatter = PatternFormatter::new(&options.format)?.with_color(options.color);
    let handler = StreamHandler::new(stream.unwrap_or_default(), options.level)
        .with_formatter(Arc::new(formatter));

    Ok(attach(
        registry,
        options.name.as_deref(),
        options.logger_level,
        Arc::new(handler),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogUtilsError;
    use crate::sinks::traits::HandlerKind;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stream_logger_levels() {
        let registry = LoggerRegistry::new();
        let buf = SharedBuf::default();
        let logger = setup_stream_logger(
            &registry,
            Some(StreamTarget::writer(buf.clone())),
            StreamLoggerOptions::new()
                .name("svc")
                .level(Level::Warning)
                .format("{levelname} {name}: {message}"),
        )
        .unwrap();

        assert_eq!(logger.name(), "svc");
        assert_eq!(logger.level(), Some(Level::Debug));

        logger.info("below handler level");
        logger.warning("disk at 91%");
        assert_eq!(buf.contents(), "WARNING svc: disk at 91%\n");
    }

    #[test]
    fn test_logger_level_can_be_left_alone() {
        let registry = LoggerRegistry::new();
        let logger = setup_stream_logger(
            &registry,
            Some(StreamTarget::writer(SharedBuf::default())),
            StreamLoggerOptions::new().logger_level(None),
        )
        .unwrap();
        assert_eq!(logger.name(), "root");
        assert_eq!(logger.level(), Some(Level::Warning));
    }

    #[test]
    fn test_repeated_setup_attaches_twice() {
        let registry = LoggerRegistry::new();
        for _ in 0..2 {
            setup_stream_logger(
                &registry,
                Some(StreamTarget::writer(SharedBuf::default())),
                StreamLoggerOptions::new().name("dup"),
            )
            .unwrap();
        }
        let handlers = registry.get_logger(Some("dup")).handlers();
        assert_eq!(handlers.len(), 2);
        assert!(handlers.iter().all(|h| h.metadata().kind == HandlerKind::Stream));
    }

    #[test]
    fn test_file_logger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.log");
        let registry = LoggerRegistry::new();

        let logger = setup_file_logger(
            &registry,
            &path,
            FileLoggerOptions::new().name("jobs").format("{levelname:<8}|{message}"),
        )
        .unwrap();
        logger.debug("filtered by handler");
        logger.error("job 7 failed");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ERROR   |job 7 failed\n");
    }

    #[test]
    fn test_setup_errors_fail_fast() {
        let registry = LoggerRegistry::new();
        let dir = TempDir::new().unwrap();

        assert!(matches!(
            setup_file_logger(&registry, dir.path(), FileLoggerOptions::new()),
            Err(LogUtilsError::IoError { .. })
        ));
        assert!(matches!(
            setup_stream_logger(&registry, None, StreamLoggerOptions::new().format("{nope}")),
            Err(LogUtilsError::InvalidArgument(_))
        ));
        // 失败的设置不会留下 handler
        assert!(registry.root().handlers().is_empty());
    }

    #[test]
    fn test_bad_time_format_rejected_at_setup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clock.log");
        let registry = LoggerRegistry::new();

        let result = setup_file_logger(
            &registry,
            &path,
            FileLoggerOptions::new().name("clock").time_format("%Q"),
        );
        assert!(matches!(result, Err(LogUtilsError::InvalidArgument(_))));
        assert!(registry.get_logger(Some("clock")).handlers().is_empty());
        // 文件在格式检查之前不会被创建
        assert!(!path.exists());
    }
}
