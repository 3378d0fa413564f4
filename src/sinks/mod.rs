//! Handler 模块
//!
//! 提供挂载在 logger 上的输出目标：数据库表、单一文件和流（标准错误、标准输出或任意写入器）。

pub mod database;
pub mod file;
pub mod stream;
pub mod traits;

// 重新导出主要类型
pub use database::{ColumnMapping, Connection, DatabaseHandler, DbError, SqlValue};
pub use file::{FileHandler, FileMode};
pub use stream::{StreamHandler, StreamTarget};
pub use traits::{ErrorHook, Handler, HandlerKind, HandlerMetadata, StderrErrorHook};
