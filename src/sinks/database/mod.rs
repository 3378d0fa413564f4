//! 数据库 handler 模块
//!
//! 此模块提供将日志记录写入数据库表的 handler、日志表 DDL 生成器，
//! 以及 handler 依赖的最小连接接口。启用 `sqlite`/`postgres`/`mysql` 特性后，
//! 可直接使用基于 Diesel 的连接实现。

pub mod connection;
#[cfg(feature = "database")]
pub mod diesel_conn;
pub mod handler;
pub mod schema;

pub use connection::{Connection, Cursor, DbError, DbResult, ParamStyle, SqlValue};
#[cfg(feature = "database")]
pub use diesel_conn::DieselConnection;
pub use handler::{ColumnMapping, DatabaseHandler, DatabaseHandlerBuilder, DatabaseHandlerConfig};
pub use schema::{
    make_log_table_definition, ColumnOverrides, ColumnSpec, Dialect, LogField, TableDefinition,
};
