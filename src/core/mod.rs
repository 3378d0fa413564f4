//! 核心模块
//!
//! 本模块包含日志级别、日志记录、格式化器、logger 层级与注册表，
//! 以及把 `tracing` 事件接入注册表的桥接层。

pub mod bridge;
pub mod formatter;
pub mod level;
pub mod logger;
pub mod record;

// 重新导出核心类型
pub use bridge::{install_global, LogBridgeLayer};
pub use formatter::{Formatter, JsonFormatter, PatternFormatter, DEFAULT_FORMAT, DEFAULT_TIME_FORMAT};
pub use level::Level;
pub use logger::{Logger, LoggerRegistry, LoggerRegistryBuilder, ROOT_LOGGER_NAME};
pub use record::{ExceptionInfo, LogRecord};
