//! 定义 logutils 的 TOML 配置结构体，以及把配置应用到 logger 注册表的函数。
//!
//! ```toml
//! root_level = "WARNING"
//!
//! [[loggers]]
//! name = "app"
//! level = "DEBUG"
//!
//! [loggers.stream]
//! target = "stderr"
//!
//! [loggers.database]
//! table = "logs"
//! [loggers.database.columns.message]
//! name = "msg"
//! ```

use crate::core::formatter::{validate_time_format, PatternFormatter};
use crate::core::level::Level;
use crate::core::logger::{Logger, LoggerRegistry};
use crate::error::{LogUtilsError, Result};
use crate::setup::{
    setup_database_logger, setup_file_logger, setup_stream_logger, DatabaseLoggerOptions,
    FileLoggerOptions, StreamLoggerOptions,
};
use crate::sinks::database::connection::Connection;
use crate::sinks::database::handler::ColumnMapping;
use crate::sinks::database::schema::{validate_table_name, ColumnOverrides};
use crate::sinks::file::FileMode;
use crate::sinks::stream::StreamTarget;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

// --- 辅助函数，用于提供配置项的默认值 ---
fn default_true() -> bool {
    true
}

/// 顶层配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogUtilsConfig {
    /// root logger 的级别
    #[serde(default)]
    pub root_level: Option<String>,

    /// 各 logger 的配置
    #[serde(default)]
    pub loggers: Vec<LoggerConfig>,
}

/// 单个 logger 的配置
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggerConfig {
    /// logger 名称，省略时为 root
    #[serde(default)]
    pub name: Option<String>,

    /// logger 级别，省略时不修改
    #[serde(default)]
    pub level: Option<String>,

    #[serde(default = "default_true")]
    pub propagate: bool,

    #[serde(default)]
    pub stream: Option<StreamSinkConfig>,

    #[serde(default)]
    pub file: Option<FileSinkConfig>,

    #[serde(default)]
    pub database: Option<DatabaseSinkConfig>,
}

/// 流的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    #[default]
    Stderr,
    Stdout,
}

/// 流 handler 配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSinkConfig {
    #[serde(default)]
    pub target: StreamKind,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub color: bool,
}

/// 文件 handler 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSinkConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub mode: FileMode,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub time_format: Option<String>,
}

/// 数据库 handler 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSinkConfig {
    pub table: String,
    #[serde(default)]
    pub level: Option<String>,
    /// 列覆盖，与生成建表语句使用的结构相同
    #[serde(default)]
    pub columns: ColumnOverrides,
}

/// 从 TOML 文件加载配置
pub fn load_config_from_file(path: &Path) -> Result<LogUtilsConfig> {
    if !path.exists() {
        return Err(LogUtilsError::ConfigFileMissing(
            path.to_string_lossy().into_owned(),
        ));
    }

    let config_str = std::fs::read_to_string(path)?;
    load_config_from_str(&config_str)
}

/// 从 TOML 字符串加载配置
pub fn load_config_from_str(config_str: &str) -> Result<LogUtilsConfig> {
    Ok(toml::from_str(config_str)?)
}

fn parse_level(value: Option<&str>) -> Result<Option<Level>> {
    value.map(Level::from_str).transpose()
}

/// 验证配置的有效性
///
/// 只检查配置本身：级别名称、表名和列名、模板。文件是否可写、表是否存在在应用时才检查。
pub fn validate_config(config: &LogUtilsConfig) -> Result<()> {
    parse_level(config.root_level.as_deref())?;

    for logger in &config.loggers {
        parse_level(logger.level.as_deref())?;

        if let Some(ref stream) = logger.stream {
            parse_level(stream.level.as_deref())?;
            if let Some(ref format) = stream.format {
                PatternFormatter::new(format)?;
            }
        }

        if let Some(ref file) = logger.file {
            parse_level(file.level.as_deref())?;
            if file.path.as_os_str().is_empty() {
                return Err(LogUtilsError::config("file sink path is empty"));
            }
            if let Some(ref format) = file.format {
                PatternFormatter::new(format)?;
            }
            if let Some(ref time_format) = file.time_format {
                validate_time_format(time_format)?;
            }
        }

        if let Some(ref database) = logger.database {
            parse_level(database.level.as_deref())?;
            validate_table_name(&database.table)?;
            ColumnMapping::from_overrides(&database.columns)?;
        }
    }

    Ok(())
}

/// 把配置应用到注册表，返回配置中每个 logger（按出现顺序）
///
/// 先完整验证配置，验证失败时注册表保持不变。含数据库 handler 的配置需要传入连接。
pub fn apply_config(
    registry: &LoggerRegistry,
    config: &LogUtilsConfig,
    connection: Option<Arc<dyn Connection>>,
) -> Result<Vec<Arc<Logger>>> {
    validate_config(config)?;

    let needs_connection = config.loggers.iter().any(|l| l.database.is_some());
    if needs_connection && connection.is_none() {
        return Err(LogUtilsError::config(
            "database sink configured but no connection was provided",
        ));
    }

    if let Some(level) = parse_level(config.root_level.as_deref())? {
        registry.root().set_level(level);
    }

    let mut loggers = Vec::with_capacity(config.loggers.len());
    for logger_config in &config.loggers {
        let logger = registry.get_logger(logger_config.name.as_deref());
        if let Some(level) = parse_level(logger_config.level.as_deref())? {
            logger.set_level(level);
        }
        logger.set_propagate(logger_config.propagate);

        let name = logger.name().to_string();

        if let Some(ref stream) = logger_config.stream {
            let mut options = StreamLoggerOptions::new()
                .name(name.as_str())
                .logger_level(None)
                .level(parse_level(stream.level.as_deref())?.unwrap_or_default())
                .color(stream.color);
            if let Some(ref format) = stream.format {
                options = options.format(format.as_str());
            }
            let target = match stream.target {
                StreamKind::Stderr => StreamTarget::Stderr,
                StreamKind::Stdout => StreamTarget::Stdout,
            };
            setup_stream_logger(registry, Some(target), options)?;
        }

        if let Some(ref file) = logger_config.file {
            let mut options = FileLoggerOptions::new()
                .name(name.as_str())
                .logger_level(None)
                .level(parse_level(file.level.as_deref())?.unwrap_or_default())
                .mode(file.mode);
            if let Some(ref format) = file.format {
                options = options.format(format.as_str());
            }
            if let Some(ref time_format) = file.time_format {
                options = options.time_format(time_format.as_str());
            }
            setup_file_logger(registry, &file.path, options)?;
        }

        if let (Some(database), Some(connection)) = (&logger_config.database, &connection) {
            let options = DatabaseLoggerOptions::new()
                .name(name.as_str())
                .logger_level(None)
                .level(parse_level(database.level.as_deref())?.unwrap_or_default())
                .columns(ColumnMapping::from_overrides(&database.columns)?);
            setup_database_logger(registry, connection.clone(), &database.table, options)?;
        }

        loggers.push(logger);
    }

    Ok(loggers)
}
