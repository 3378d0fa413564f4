//! logutils - 数据库日志 handler 与 logger 设置工具
//!
//! 提供三部分功能：
//!
//! - 生成标准日志表的 `CREATE TABLE` 语句（[`make_log_table_definition`]）
//! - 把日志记录逐条写入数据库表的 [`DatabaseHandler`]
//! - 把数据库、文件、流 handler 挂载到命名 logger 的设置函数
//!
//! # 快速开始
//!
//! ```rust
//! use logutils::{get_logger, setup_stream_logger, Level, StreamLoggerOptions};
//!
//! fn main() -> logutils::Result<()> {
//!     let logger = setup_stream_logger(None, StreamLoggerOptions::new().name("app").level(Level::Debug))?;
//!     logger.info("Application started");
//!
//!     get_logger(Some("app.db")).warning("slow query");
//!     Ok(())
//! }
//! ```
//!
//! # 建表语句
//!
//! ```rust
//! use logutils::{make_log_table_definition, ColumnOverrides, ColumnSpec};
//!
//! let overrides = ColumnOverrides::new().set_by_name("message", ColumnSpec::new().name("msg"))?;
//! let ddl = make_log_table_definition("app_logs", "log_id", &overrides)?;
//! assert!(ddl.contains("msg"));
//! # Ok::<(), logutils::LogUtilsError>(())
//! ```
//!
//! 这里的函数都使用进程级的全局注册表；需要隔离的场景（例如测试）可以创建
//! [`LoggerRegistry`] 并调用 [`setup`] 模块中接受注册表参数的同名函数。

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod setup;
pub mod sinks;

// 重新导出主要类型
pub use config::{apply_config, load_config_from_file, load_config_from_str, validate_config, LogUtilsConfig};
pub use diagnostics::{get_diagnostics, DiagnosticsSnapshot};
pub use error::{LogUtilsError, Result};
pub use setup::{DatabaseLoggerOptions, FileLoggerOptions, StreamLoggerOptions};

// 重新导出核心功能
pub use crate::core::{
    Formatter, Level, LogBridgeLayer, LogRecord, Logger, LoggerRegistry, PatternFormatter,
};
pub use sinks::database::{
    make_log_table_definition, ColumnMapping, ColumnOverrides, ColumnSpec, Connection, Cursor,
    DatabaseHandler, DbError, Dialect, LogField, ParamStyle, SqlValue, TableDefinition,
};
#[cfg(feature = "database")]
pub use sinks::database::DieselConnection;
pub use sinks::{ErrorHook, FileHandler, FileMode, Handler, StreamHandler, StreamTarget};

use std::path::Path;
use std::sync::Arc;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 从全局注册表获取 logger，`None` 表示 root
pub fn get_logger(name: Option<&str>) -> Arc<Logger> {
    LoggerRegistry::global().get_logger(name)
}

/// 在全局注册表上挂载数据库 handler，参见 [`setup::setup_database_logger`]
pub fn setup_database_logger<C>(
    connection: Arc<C>,
    table: &str,
    options: DatabaseLoggerOptions,
) -> Result<Arc<Logger>>
where
    C: Connection + ?Sized + 'static,
{
    setup::setup_database_logger(LoggerRegistry::global(), connection, table, options)
}

/// 在全局注册表上挂载文件 handler，参见 [`setup::setup_file_logger`]
pub fn setup_file_logger(path: impl AsRef<Path>, options: FileLoggerOptions) -> Result<Arc<Logger>> {
    setup::setup_file_logger(LoggerRegistry::global(), path, options)
}

/// 在全局注册表上挂载流 handler，`stream` 为 `None` 时写标准错误
pub fn setup_stream_logger(
    stream: Option<StreamTarget>,
    options: StreamLoggerOptions,
) -> Result<Arc<Logger>> {
    setup::setup_stream_logger(LoggerRegistry::global(), stream, options)
}

/// 把全局注册表安装为 `tracing` 的全局 subscriber
///
/// 之后 `tracing::info!` 等宏产生的事件按 target 交给对应的 logger。
/// 全局 subscriber 只能安装一次，重复调用返回 `InitializationError`。
pub fn init() -> Result<()> {
    crate::core::install_global(LoggerRegistry::global().clone())
}

/// 把配置应用到全局注册表
pub fn init_with_config(
    config: &LogUtilsConfig,
    connection: Option<Arc<dyn Connection>>,
) -> Result<Vec<Arc<Logger>>> {
    apply_config(LoggerRegistry::global(), config, connection)
}
