//! 数据库日志 handler
//!
//! 每条通过级别过滤的记录转换为一条参数化 INSERT，立即执行并提交。
//! 没有缓冲、批量或重试：写入失败的记录丢失，错误经 logger 派发交给注册表的错误钩子。

use crate::core::formatter::Formatter;
use crate::core::level::Level;
use crate::core::record::LogRecord;
use crate::diagnostics::init_diagnostics;
use crate::error::{LogUtilsError, Result};
use crate::sinks::database::connection::{Connection, DbResult, SqlValue};
use crate::sinks::database::schema::{
    resolve_columns, validate_identifier, validate_table_name, ColumnOverrides, Dialect, LogField,
};
use crate::sinks::traits::{Handler, HandlerKind, HandlerMetadata};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// 列名到逻辑字段的映射，决定 INSERT 的列顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<(String, LogField)>,
}

impl Default for ColumnMapping {
    /// 默认表的九个列
    fn default() -> Self {
        Self {
            columns: LogField::DEFAULTS
                .into_iter()
                .map(|field| (field.as_str().to_string(), field))
                .collect(),
        }
    }
}

impl ColumnMapping {
    /// 从 (列名, 字段) 对构建，校验列名并拒绝重复
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, LogField)>,
        S: Into<String>,
    {
        let columns: Vec<(String, LogField)> = columns
            .into_iter()
            .map(|(name, field)| (name.into(), field))
            .collect();

        if columns.is_empty() {
            return Err(LogUtilsError::invalid_argument("column mapping is empty"));
        }

        let mut seen = HashSet::new();
        for (name, _) in &columns {
            validate_identifier("column name", name)?;
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(LogUtilsError::invalid_argument(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }

        Ok(Self { columns })
    }

    /// 从 (列名, 字段名) 对构建，未知字段名返回 `InvalidArgument`
    pub fn from_names(columns: &[(&str, &str)]) -> Result<Self> {
        let parsed = columns
            .iter()
            .map(|(column, field)| Ok((column.to_string(), field.parse::<LogField>()?)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(parsed)
    }

    /// 与 `make_log_table_definition` 使用同一份覆盖配置，保证列名一致
    pub fn from_overrides(overrides: &ColumnOverrides) -> Result<Self> {
        let columns = resolve_columns(overrides, Dialect::default())?;
        Self::new(columns.into_iter().map(|c| (c.name, c.field)))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = LogField> + '_ {
        self.columns.iter().map(|(_, field)| *field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// 数据库 handler 配置，构造后不可修改
#[derive(Clone)]
pub struct DatabaseHandlerConfig {
    pub table: String,
    pub columns: ColumnMapping,
    pub level: Level,
    pub message_formatter: Option<Arc<dyn Formatter>>,
}

impl fmt::Debug for DatabaseHandlerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandlerConfig")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("level", &self.level)
            .field("message_formatter", &self.message_formatter)
            .finish()
    }
}

/// 将日志记录写入数据库表的 handler
pub struct DatabaseHandler<C: Connection + ?Sized> {
    connection: Arc<C>,
    config: DatabaseHandlerConfig,
    insert_sql: String,
}

impl<C: Connection + ?Sized> fmt::Debug for DatabaseHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandler")
            .field("config", &self.config)
            .field("insert_sql", &self.insert_sql)
            .field("connection", &"<Connection>")
            .finish()
    }
}

impl<C: Connection + ?Sized> DatabaseHandler<C> {
    /// 使用默认列映射和 INFO 级别创建 handler
    pub fn new(connection: Arc<C>, table: &str) -> Result<Self> {
        Self::builder(connection, table).build()
    }

    /// 创建构建器
    pub fn builder(connection: Arc<C>, table: &str) -> DatabaseHandlerBuilder<C> {
        DatabaseHandlerBuilder {
            connection,
            table: table.to_string(),
            columns: ColumnMapping::default(),
            level: Level::default(),
            message_formatter: None,
        }
    }

    /// 预先生成的 INSERT 语句
    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    pub fn config(&self) -> &DatabaseHandlerConfig {
        &self.config
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// 将记录转换为与列映射一一对应的参数
    pub fn record_values(&self, record: &LogRecord) -> Result<Vec<SqlValue>> {
        self.config
            .columns
            .fields()
            .map(|field| self.field_value(field, record))
            .collect()
    }

    fn field_value(&self, field: LogField, record: &LogRecord) -> Result<SqlValue> {
        let value = match field {
            LogField::Date => SqlValue::Timestamp(record.timestamp.naive_utc()),
            LogField::Logger => SqlValue::text(record.logger.as_str()),
            LogField::Module => optional_text(record.module_path.as_deref()),
            LogField::File => optional_text(record.file.as_deref()),
            LogField::Line => record
                .line
                .map_or(SqlValue::Null, |line| SqlValue::Integer(i64::from(line))),
            LogField::Level => SqlValue::Integer(i64::from(record.level.as_u8())),
            LogField::LevelName => SqlValue::text(record.level.as_str()),
            LogField::Message => match self.config.message_formatter {
                Some(ref formatter) => SqlValue::text(formatter.format(record)),
                None => SqlValue::text(record.message.as_str()),
            },
            LogField::Traceback => record
                .exception
                .as_ref()
                .map_or(SqlValue::Null, |e| SqlValue::text(e.to_single_line())),
            LogField::Thread => optional_text(record.thread_name.as_deref()),
            LogField::Process => SqlValue::Integer(i64::from(record.process_id)),
            LogField::Fields => {
                if record.fields.is_empty() {
                    SqlValue::Null
                } else {
                    SqlValue::Text(serde_json::to_string(&record.fields)?)
                }
            }
        };
        Ok(value)
    }

    fn execute_insert(&self, params: &[SqlValue]) -> DbResult<()> {
        {
            let mut cursor = self.connection.cursor()?;
            cursor.execute(&self.insert_sql, params)?;
        }
        self.connection.commit()
    }

    /// 对照数据库中的表结构检查映射的列
    ///
    /// 连接不支持自省时直接通过；自省本身失败只记录警告，不视为配置错误。
    pub fn check_table_columns(&self) -> Result<()> {
        let existing = match self.connection.table_columns(&self.config.table) {
            Ok(Some(columns)) => columns,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!(table = %self.config.table, error = %e, "无法读取日志表结构，跳过列校验");
                return Ok(());
            }
        };

        let existing: HashSet<String> = existing.iter().map(|c| c.to_ascii_lowercase()).collect();
        let missing: Vec<String> = self
            .config
            .columns
            .column_names()
            .filter(|name| !existing.contains(&name.to_ascii_lowercase()))
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(LogUtilsError::SchemaMismatch {
                table: self.config.table.clone(),
                missing,
            })
        }
    }
}

impl<C: Connection + ?Sized> Handler for DatabaseHandler<C> {
    fn level(&self) -> Level {
        self.config.level
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        let params = self.record_values(record)?;

        match self.execute_insert(&params) {
            Ok(()) => {
                init_diagnostics().increment_database_writes();
                Ok(())
            }
            Err(e) => {
                // 只回滚，不重试，避免连接停留在失败的事务中
                if let Err(rollback_error) = self.connection.rollback() {
                    warn!(
                        table = %self.config.table,
                        error = %rollback_error,
                        "回滚失败，连接可能仍处于中止的事务中"
                    );
                }
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        "database"
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new(format!("database:{}", self.config.table), HandlerKind::Database)
            .with_description(self.insert_sql.clone())
    }
}

/// 数据库 handler 构建器
pub struct DatabaseHandlerBuilder<C: Connection + ?Sized> {
    connection: Arc<C>,
    table: String,
    columns: ColumnMapping,
    level: Level,
    message_formatter: Option<Arc<dyn Formatter>>,
}

impl<C: Connection + ?Sized> DatabaseHandlerBuilder<C> {
    pub fn columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// 用格式化器渲染 `message` 列
    pub fn message_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.message_formatter = Some(formatter);
        self
    }

    pub fn build(self) -> Result<DatabaseHandler<C>> {
        validate_table_name(&self.table)?;

        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.column_names().collect::<Vec<_>>().join(", "),
            self.connection.param_style().placeholders(self.columns.len())
        );

        Ok(DatabaseHandler {
            connection: self.connection,
            config: DatabaseHandlerConfig {
                table: self.table,
                columns: self.columns,
                level: self.level,
                message_formatter: self.message_formatter,
            },
            insert_sql,
        })
    }
}

fn optional_text(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::text)
}
