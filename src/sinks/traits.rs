//! Handler 与错误钩子接口
//!
//! # 架构设计
//!
//! - `Handler`: 挂载在 logger 上的日志输出目标，按自己的级别过滤记录并写出
//! - `ErrorHook`: handler 写入失败时的报告通道
//!
//! handler 的 `emit` 返回 `Result`，但 logger 派发时从不把错误返回给调用方：
//! 错误交给 registry 的 `ErrorHook`，日志调用点总是正常返回。
//!
//! # 使用示例
//!
//! ```rust
//! use logutils::core::{Level, LogRecord};
//! use logutils::sinks::traits::{Handler, HandlerKind, HandlerMetadata};
//! use logutils::Result;
//!
//! #[derive(Debug)]
//! struct PrintHandler;
//!
//! impl Handler for PrintHandler {
//!     fn level(&self) -> Level {
//!         Level::Info
//!     }
//!
//!     fn emit(&self, record: &LogRecord) -> Result<()> {
//!         println!("{}: {}", record.level, record.message);
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "print"
//!     }
//!
//!     fn metadata(&self) -> HandlerMetadata {
//!         HandlerMetadata::new("print".to_string(), HandlerKind::Custom)
//!     }
//! }
//! ```

use crate::core::level::Level;
use crate::core::record::LogRecord;
use crate::error::{LogUtilsError, Result};
use std::fmt::Debug;
use std::io::Write;

/// 日志输出目标
pub trait Handler: Send + Sync + Debug {
    /// handler 的最低级别，低于此级别的记录不会传给 `emit`
    fn level(&self) -> Level;

    /// 写出一条已经通过级别过滤的记录
    fn emit(&self, record: &LogRecord) -> Result<()>;

    /// 刷新缓冲区
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// 获取 handler 的名称
    fn name(&self) -> &'static str;

    /// 获取 handler 的元数据
    fn metadata(&self) -> HandlerMetadata;

    /// 判断记录是否通过 handler 的级别过滤
    fn accepts(&self, record: &LogRecord) -> bool {
        record.level >= self.level()
    }
}

/// handler 写入失败时的报告通道
pub trait ErrorHook: Send + Sync + Debug {
    /// 报告一次写入失败，实现不得 panic
    fn handle_error(&self, handler: &str, record: &LogRecord, error: &LogUtilsError);
}

/// 默认错误钩子：写到标准错误并累加诊断计数
#[derive(Debug, Clone, Default)]
pub struct StderrErrorHook;

impl ErrorHook for StderrErrorHook {
    fn handle_error(&self, handler: &str, record: &LogRecord, error: &LogUtilsError) {
        crate::diagnostics::init_diagnostics().increment_handler_errors();

        // 写标准错误本身失败时只能放弃
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "--- Logging error ---\n{}\nHandler: {}, Logger: {}, Level: {}\nMessage: {:?}",
            error, handler, record.logger, record.level, record.message
        );
        let _ = stderr.flush();
    }
}

/// Handler 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Database,
    File,
    Stream,
    Custom,
}

/// Handler 元数据
#[derive(Debug, Clone)]
pub struct HandlerMetadata {
    /// Handler 名称
    pub name: String,
    /// Handler 类型
    pub kind: HandlerKind,
    /// 描述信息
    pub description: Option<String>,
}

impl HandlerMetadata {
    /// 创建新的 handler 元数据
    pub fn new(name: String, kind: HandlerKind) -> Self {
        Self {
            name,
            kind,
            description: None,
        }
    }

    /// 设置描述信息
    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}
