//! 日志表结构定义
//!
//! 生成日志表的 `CREATE TABLE` 语句。表名与列名无法通过占位符参数化，
//! 因此这里对所有标识符做严格校验，只允许 `[A-Za-z_][A-Za-z0-9_]*`
//! （表名允许 `schema.table` 形式），不做转义。
//!
//! 本模块只生成字符串，不访问数据库；执行由调用方负责。

use crate::error::{LogUtilsError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// 标识符最大长度
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// 日志记录的逻辑字段，每个字段对应日志表的一列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogField {
    /// 记录时间
    Date,
    /// logger 名称
    Logger,
    /// 模块名
    Module,
    /// 源文件名
    File,
    /// 行号
    Line,
    /// 级别数值
    Level,
    /// 级别名称
    LevelName,
    /// 消息
    Message,
    /// 错误链文本
    Traceback,
    /// 线程名
    Thread,
    /// 进程 ID
    Process,
    /// 结构化字段（JSON）
    Fields,
}

impl LogField {
    /// 默认表包含的字段，按列顺序
    pub const DEFAULTS: [LogField; 9] = [
        LogField::Date,
        LogField::Logger,
        LogField::Module,
        LogField::File,
        LogField::Line,
        LogField::Level,
        LogField::LevelName,
        LogField::Message,
        LogField::Traceback,
    ];

    /// 仅在显式配置时才加入表的字段
    pub const OPTIONAL: [LogField; 3] = [LogField::Thread, LogField::Process, LogField::Fields];

    /// 字段名，同时也是默认列名
    pub fn as_str(self) -> &'static str {
        match self {
            LogField::Date => "date",
            LogField::Logger => "logger",
            LogField::Module => "module",
            LogField::File => "file",
            LogField::Line => "line",
            LogField::Level => "level",
            LogField::LevelName => "level_name",
            LogField::Message => "message",
            LogField::Traceback => "traceback",
            LogField::Thread => "thread",
            LogField::Process => "process",
            LogField::Fields => "fields",
        }
    }

    /// 默认是否允许 NULL
    pub fn default_nullable(self) -> bool {
        !matches!(self, LogField::Date | LogField::Level | LogField::LevelName)
    }

    /// 指定方言下的默认列类型
    pub fn default_sql_type(self, dialect: Dialect) -> &'static str {
        match self {
            LogField::Date => dialect.timestamp_type(),
            LogField::Logger | LogField::Module | LogField::LevelName | LogField::Thread => {
                "VARCHAR(100)"
            }
            LogField::File => "VARCHAR(255)",
            LogField::Line | LogField::Level | LogField::Process => dialect.integer_type(),
            LogField::Message | LogField::Traceback | LogField::Fields => dialect.unbounded_text_type(),
        }
    }
}

impl fmt::Display for LogField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogField {
    type Err = LogUtilsError;

    fn from_str(s: &str) -> Result<Self> {
        LogField::DEFAULTS
            .into_iter()
            .chain(LogField::OPTIONAL)
            .find(|field| field.as_str() == s)
            .ok_or_else(|| LogUtilsError::invalid_argument(format!("unknown log field '{}'", s)))
    }
}

/// SQL 方言，决定主键与默认列类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    Mysql,
    SqlServer,
}

impl Dialect {
    /// 自增整数主键的类型与约束
    pub fn primary_key_clause(self) -> &'static str {
        match self {
            Dialect::Sqlite => "INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT",
            Dialect::Postgres => "BIGSERIAL NOT NULL PRIMARY KEY",
            Dialect::Mysql => "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
            Dialect::SqlServer => "INT NOT NULL IDENTITY PRIMARY KEY",
        }
    }

    fn timestamp_type(self) -> &'static str {
        match self {
            Dialect::Postgres => "TIMESTAMP",
            Dialect::SqlServer => "DATETIME2",
            Dialect::Sqlite | Dialect::Mysql => "DATETIME",
        }
    }

    fn integer_type(self) -> &'static str {
        match self {
            Dialect::Sqlite | Dialect::Postgres => "INTEGER",
            Dialect::Mysql | Dialect::SqlServer => "INT",
        }
    }

    fn unbounded_text_type(self) -> &'static str {
        match self {
            Dialect::SqlServer => "NVARCHAR(MAX)",
            _ => "TEXT",
        }
    }
}

/// 单列的覆盖配置，未设置的部分使用默认值
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    /// 列名
    pub name: Option<String>,
    /// 列类型
    pub sql_type: Option<String>,
    /// 是否允许 NULL
    pub nullable: Option<bool>,
}

impl ColumnSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn sql_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = Some(sql_type.into());
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }
}

/// 各逻辑字段的列覆盖配置
///
/// 每个已知字段一个槽位，未知字段在反序列化（`deny_unknown_fields`）或
/// `set_by_name` 时被拒绝。可选字段（thread、process、fields）只有在这里出现时才会加入表。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnOverrides {
    pub date: Option<ColumnSpec>,
    pub logger: Option<ColumnSpec>,
    pub module: Option<ColumnSpec>,
    pub file: Option<ColumnSpec>,
    pub line: Option<ColumnSpec>,
    pub level: Option<ColumnSpec>,
    pub level_name: Option<ColumnSpec>,
    pub message: Option<ColumnSpec>,
    pub traceback: Option<ColumnSpec>,
    pub thread: Option<ColumnSpec>,
    pub process: Option<ColumnSpec>,
    pub fields: Option<ColumnSpec>,
}

impl ColumnOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, field: LogField) -> &Option<ColumnSpec> {
        match field {
            LogField::Date => &self.date,
            LogField::Logger => &self.logger,
            LogField::Module => &self.module,
            LogField::File => &self.file,
            LogField::Line => &self.line,
            LogField::Level => &self.level,
            LogField::LevelName => &self.level_name,
            LogField::Message => &self.message,
            LogField::Traceback => &self.traceback,
            LogField::Thread => &self.thread,
            LogField::Process => &self.process,
            LogField::Fields => &self.fields,
        }
    }

    fn slot_mut(&mut self, field: LogField) -> &mut Option<ColumnSpec> {
        match field {
            LogField::Date => &mut self.date,
            LogField::Logger => &mut self.logger,
            LogField::Module => &mut self.module,
            LogField::File => &mut self.file,
            LogField::Line => &mut self.line,
            LogField::Level => &mut self.level,
            LogField::LevelName => &mut self.level_name,
            LogField::Message => &mut self.message,
            LogField::Traceback => &mut self.traceback,
            LogField::Thread => &mut self.thread,
            LogField::Process => &mut self.process,
            LogField::Fields => &mut self.fields,
        }
    }

    /// 字段的覆盖配置
    pub fn get(&self, field: LogField) -> Option<&ColumnSpec> {
        self.slot(field).as_ref()
    }

    /// 设置字段的覆盖配置
    pub fn set(mut self, field: LogField, spec: ColumnSpec) -> Self {
        *self.slot_mut(field) = Some(spec);
        self
    }

    /// 按字段名设置，未知字段名返回 `InvalidArgument`
    pub fn set_by_name(self, field: &str, spec: ColumnSpec) -> Result<Self> {
        Ok(self.set(field.parse()?, spec))
    }

    /// 表中包含的字段：全部默认字段，加上被显式配置的可选字段
    pub fn included_fields(&self) -> Vec<LogField> {
        LogField::DEFAULTS
            .into_iter()
            .chain(
                LogField::OPTIONAL
                    .into_iter()
                    .filter(|field| self.get(*field).is_some()),
            )
            .collect()
    }
}

/// 解析后的列定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub field: LogField,
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

/// 合并默认值与覆盖配置，校验列名和类型
pub fn resolve_columns(overrides: &ColumnOverrides, dialect: Dialect) -> Result<Vec<ResolvedColumn>> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();

    for field in overrides.included_fields() {
        let spec = overrides.get(field);
        let name = spec
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| field.as_str().to_string());
        validate_identifier("column name", &name)?;

        let sql_type = spec
            .and_then(|s| s.sql_type.clone())
            .unwrap_or_else(|| field.default_sql_type(dialect).to_string());
        validate_sql_type(&sql_type)?;

        let nullable = spec
            .and_then(|s| s.nullable)
            .unwrap_or_else(|| field.default_nullable());

        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(LogUtilsError::invalid_argument(format!(
                "duplicate column name '{}'",
                name
            )));
        }

        columns.push(ResolvedColumn {
            field,
            name,
            sql_type: sql_type.trim().to_string(),
            nullable,
        });
    }

    Ok(columns)
}

/// 校验单个 SQL 标识符
pub fn validate_identifier(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(LogUtilsError::invalid_argument(format!("{} is empty", kind)));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(LogUtilsError::invalid_argument(format!(
            "{} '{}' is longer than {} characters",
            kind, value, MAX_IDENTIFIER_LEN
        )));
    }

    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(LogUtilsError::invalid_argument(format!(
            "{} '{}' is not a valid SQL identifier",
            kind, value
        )));
    }
    Ok(())
}

/// 校验表名，允许 `schema.table`
pub fn validate_table_name(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(LogUtilsError::invalid_argument("table name is empty"));
    }
    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() > 2 {
        return Err(LogUtilsError::invalid_argument(format!(
            "table name '{}' has too many qualifiers",
            value
        )));
    }
    for part in parts {
        validate_identifier("table name", part)?;
    }
    Ok(())
}

fn validate_sql_type(value: &str) -> Result<()> {
    let trimmed = value.trim();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '(' | ')' | ',');
    if trimmed.is_empty() || !trimmed.chars().all(allowed) {
        return Err(LogUtilsError::invalid_argument(format!(
            "column type '{}' is not allowed",
            value
        )));
    }
    Ok(())
}

/// 日志表定义构建器
#[derive(Debug, Clone)]
pub struct TableDefinition {
    table_name: String,
    primary_key_name: String,
    overrides: ColumnOverrides,
    dialect: Dialect,
}

impl TableDefinition {
    pub fn new(table_name: impl Into<String>, primary_key_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key_name: primary_key_name.into(),
            overrides: ColumnOverrides::default(),
            dialect: Dialect::default(),
        }
    }

    pub fn overrides(mut self, overrides: ColumnOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// 生成 `CREATE TABLE` 语句
    pub fn build(&self) -> Result<String> {
        validate_table_name(&self.table_name)?;
        validate_identifier("primary key name", &self.primary_key_name)?;

        let columns = resolve_columns(&self.overrides, self.dialect)?;
        if columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&self.primary_key_name))
        {
            return Err(LogUtilsError::invalid_argument(format!(
                "primary key name '{}' collides with a log column",
                self.primary_key_name
            )));
        }

        let name_width = columns
            .iter()
            .map(|c| c.name.len())
            .chain(std::iter::once(self.primary_key_name.len()))
            .max()
            .unwrap_or(0)
            .max(11);
        let type_width = columns
            .iter()
            .map(|c| c.sql_type.len())
            .max()
            .unwrap_or(0)
            .max(13);

        let mut sql = format!("CREATE TABLE {} (\n", self.table_name);
        sql.push_str(&format!(
            "      {:<nw$} {}\n",
            self.primary_key_name,
            self.dialect.primary_key_clause(),
            nw = name_width
        ));
        for column in &columns {
            let null = if column.nullable { "    NULL" } else { "NOT NULL" };
            sql.push_str(&format!(
                "    , {:<nw$} {:<tw$} {}\n",
                column.name,
                column.sql_type,
                null,
                nw = name_width,
                tw = type_width
            ));
        }
        sql.push_str(");");
        Ok(sql)
    }
}

/// 生成默认方言（SQLite）下的日志表定义
///
/// `primary_key_name` 是自增主键列的列名，原样出现在语句中。
///
/// # 示例
///
/// ```rust
/// use logutils::sinks::database::schema::{make_log_table_definition, ColumnOverrides};
///
/// let ddl = make_log_table_definition("app_logs", "log_id", &ColumnOverrides::default()).unwrap();
/// assert!(ddl.starts_with("CREATE TABLE app_logs ("));
/// ```
pub fn make_log_table_definition(
    table_name: &str,
    primary_key_name: &str,
    overrides: &ColumnOverrides,
) -> Result<String> {
    TableDefinition::new(table_name, primary_key_name)
        .overrides(overrides.clone())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_lines(ddl: &str) -> Vec<&str> {
        ddl.lines()
            .filter(|line| line.starts_with("    , "))
            .collect()
    }

    #[test]
    fn test_default_definition() {
        let ddl = make_log_table_definition("logs", "log_id", &ColumnOverrides::default()).unwrap();

        let expected = "CREATE TABLE logs (
      log_id      INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT
    , date        DATETIME      NOT NULL
    , logger      VARCHAR(100)      NULL
    , module      VARCHAR(100)      NULL
    , file        VARCHAR(255)      NULL
    , line        INTEGER           NULL
    , level       INTEGER       NOT NULL
    , level_name  VARCHAR(100)  NOT NULL
    , message     TEXT              NULL
    , traceback   TEXT              NULL
);";
        assert_eq!(ddl, expected);
    }

    #[test]
    fn test_one_column_per_default_field() {
        let ddl = make_log_table_definition("logs", "id", &ColumnOverrides::default()).unwrap();
        assert_eq!(column_lines(&ddl).len(), LogField::DEFAULTS.len());
        assert_eq!(ddl.matches("PRIMARY KEY").count(), 1);
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = ColumnOverrides::new()
            .set(
                LogField::Message,
                ColumnSpec::new().name("msg").sql_type("VARCHAR(400)"),
            )
            .set(LogField::Thread, ColumnSpec::new())
            .set_by_name("logger", ColumnSpec::new().nullable(false))
            .unwrap();
        let ddl = make_log_table_definition("audit.logs", "entry_id", &overrides).unwrap();

        assert!(ddl.starts_with("CREATE TABLE audit.logs ("));
        assert!(ddl.contains("msg         VARCHAR(400)"));
        assert!(!ddl.contains(" message "));
        assert!(ddl.contains("thread      VARCHAR(100)      NULL"));
        assert!(ddl.contains("logger      VARCHAR(100)  NOT NULL"));
        assert_eq!(column_lines(&ddl).len(), LogField::DEFAULTS.len() + 1);
    }

    #[test]
    fn test_dialects() {
        let pg = TableDefinition::new("logs", "id")
            .dialect(Dialect::Postgres)
            .build()
            .unwrap();
        assert!(pg.contains("BIGSERIAL NOT NULL PRIMARY KEY"));
        assert!(pg.contains("TIMESTAMP"));

        let mssql = TableDefinition::new("logs", "log_id")
            .dialect(Dialect::SqlServer)
            .build()
            .unwrap();
        assert!(mssql.contains("INT NOT NULL IDENTITY PRIMARY KEY"));
        assert!(mssql.contains("NVARCHAR(MAX)"));

        let mysql = TableDefinition::new("logs", "log_id")
            .dialect(Dialect::Mysql)
            .build()
            .unwrap();
        assert!(mysql.contains("AUTO_INCREMENT"));
    }

    #[test]
    fn test_invalid_identifiers_rejected() {
        let overrides = ColumnOverrides::default();
        for bad in ["", "logs; DROP TABLE users", "1logs", "log-table", "lo gs", "a.b.c", "\"logs\""] {
            assert!(
                matches!(
                    make_log_table_definition(bad, "id", &overrides),
                    Err(LogUtilsError::InvalidArgument(_))
                ),
                "table name {:?} accepted",
                bad
            );
        }
        for bad in ["", "id)", "schema.id", "ïd"] {
            assert!(matches!(
                make_log_table_definition("logs", bad, &overrides),
                Err(LogUtilsError::InvalidArgument(_))
            ));
        }
        let too_long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(make_log_table_definition(&too_long, "id", &overrides).is_err());
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let bad_name = ColumnOverrides::new().set(LogField::Date, ColumnSpec::new().name("when?"));
        assert!(make_log_table_definition("logs", "id", &bad_name).is_err());

        let bad_type =
            ColumnOverrides::new().set(LogField::Date, ColumnSpec::new().sql_type("TEXT; DROP"));
        assert!(make_log_table_definition("logs", "id", &bad_type).is_err());

        let duplicate =
            ColumnOverrides::new().set(LogField::Message, ColumnSpec::new().name("LOGGER"));
        assert!(make_log_table_definition("logs", "id", &duplicate).is_err());

        let collision = ColumnOverrides::default();
        assert!(make_log_table_definition("logs", "level", &collision).is_err());

        assert!(ColumnOverrides::new()
            .set_by_name("funcName", ColumnSpec::new())
            .is_err());
    }

    #[test]
    fn test_overrides_deserialize_rejects_unknown_keys() {
        let ok: ColumnOverrides = toml::from_str("[message]\nname = \"msg\"\n").unwrap();
        assert_eq!(ok.message.unwrap().name.as_deref(), Some("msg"));

        assert!(toml::from_str::<ColumnOverrides>("[mesage]\nname = \"msg\"\n").is_err());
        assert!(toml::from_str::<ColumnOverrides>("[message]\ntype = \"TEXT\"\n").is_err());
    }
}
