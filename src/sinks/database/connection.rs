//! 数据库连接接口
//!
//! 数据库 handler 需要的能力只有四项：获取游标、执行参数化语句、提交、回滚。
//! 调用方为自己的驱动实现 `Connection`，handler 通过 `Arc` 共享连接，从不关闭它。
//!
//! 所有方法都接收 `&self`。连接本身不支持并发使用时，由实现者在内部加锁；
//! handler 不额外做同步。

use chrono::NaiveDateTime;
use std::fmt;

/// 数据库错误。驱动返回的未知错误归入 `Backend`。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DbError {
    /// 连接丢失、超时等连接层面的错误
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// 约束冲突等数据完整性错误
    #[error("Data integrity error: {0}")]
    Integrity(String),

    /// 其他驱动错误
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DbError {
    /// 是否为连接层面的错误
    pub fn is_connectivity(&self) -> bool {
        matches!(self, DbError::Connectivity(_))
    }
}

/// 数据库操作结果类型
pub type DbResult<T> = std::result::Result<T, DbError>;

/// 绑定到语句占位符的值
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// 文本值，空白字符串视为 NULL
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            SqlValue::Null
        } else {
            SqlValue::Text(value)
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Timestamp(ts) => write!(f, "'{}'", ts.format("%Y-%m-%d %H:%M:%S%.6f")),
        }
    }
}

/// 占位符风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `?`（SQLite、MySQL、ODBC）
    #[default]
    Qmark,
    /// `$1, $2, ...`（PostgreSQL）
    Numeric,
    /// `%s`（部分 PostgreSQL/MySQL 驱动）
    Format,
}

impl ParamStyle {
    /// 第 `index` 个（从 0 开始）占位符
    pub fn placeholder(self, index: usize) -> String {
        match self {
            ParamStyle::Qmark => "?".to_string(),
            ParamStyle::Numeric => format!("${}", index + 1),
            ParamStyle::Format => "%s".to_string(),
        }
    }

    /// `count` 个占位符，以逗号分隔
    pub fn placeholders(self, count: usize) -> String {
        (0..count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 游标：执行参数化语句
pub trait Cursor {
    /// 执行语句，返回受影响的行数
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64>;
}

/// 数据库连接能力接口
pub trait Connection: Send + Sync {
    /// 获取游标
    fn cursor(&self) -> DbResult<Box<dyn Cursor + '_>>;

    /// 提交当前事务
    fn commit(&self) -> DbResult<()>;

    /// 回滚当前事务
    fn rollback(&self) -> DbResult<()>;

    /// 驱动使用的占位符风格
    fn param_style(&self) -> ParamStyle {
        ParamStyle::Qmark
    }

    /// 表的列名。不支持自省的连接返回 `Ok(None)`，表不存在时返回 `Ok(Some(vec![]))`。
    fn table_columns(&self, _table: &str) -> DbResult<Option<Vec<String>>> {
        Ok(None)
    }
}

impl<C: Connection + ?Sized> Connection for std::sync::Arc<C> {
    fn cursor(&self) -> DbResult<Box<dyn Cursor + '_>> {
        (**self).cursor()
    }

    fn commit(&self) -> DbResult<()> {
        (**self).commit()
    }

    fn rollback(&self) -> DbResult<()> {
        (**self).rollback()
    }

    fn param_style(&self) -> ParamStyle {
        (**self).param_style()
    }

    fn table_columns(&self, table: &str) -> DbResult<Option<Vec<String>>> {
        (**self).table_columns(table)
    }
}
