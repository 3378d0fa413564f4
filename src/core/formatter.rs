//! 格式化器
//!
//! 将 `LogRecord` 渲染为文本。文件与流 handler 使用 `PatternFormatter`，
//! 数据库 handler 可选地用格式化器渲染 `message` 列。

use crate::core::level::Level;
use crate::core::record::LogRecord;
use crate::error::{LogUtilsError, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use colored::Colorize;
use std::fmt::{Debug, Write as _};

/// 默认文本模板
pub const DEFAULT_FORMAT: &str = "{asctime} {levelname:<8} {message}";

/// 默认时间格式，毫秒以逗号分隔
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// 格式化器接口
pub trait Formatter: Send + Sync + Debug {
    /// 将记录渲染为单条文本（可以包含换行）
    fn format(&self, record: &LogRecord) -> String;
}

/// 模板中可以引用的记录属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    AscTime,
    Created,
    LevelName,
    LevelNo,
    Name,
    Message,
    Module,
    FileName,
    LineNo,
    Thread,
    Process,
}

impl Placeholder {
    fn parse(key: &str) -> Option<Self> {
        Some(match key {
            "asctime" => Self::AscTime,
            "created" => Self::Created,
            "levelname" => Self::LevelName,
            "levelno" => Self::LevelNo,
            "name" => Self::Name,
            "message" => Self::Message,
            "module" => Self::Module,
            "filename" => Self::FileName,
            "lineno" => Self::LineNo,
            "thread" => Self::Thread,
            "process" => Self::Process,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field {
        placeholder: Placeholder,
        width: Option<(Align, usize)>,
    },
}

/// 模板格式化器
///
/// 模板形如 `{asctime} {levelname:<8} {message}`，`{{` 和 `}}` 表示字面量花括号。
/// 未知的占位符在构造时即报错。
#[derive(Debug, Clone)]
pub struct PatternFormatter {
    pattern: String,
    segments: Vec<Segment>,
    time_format: String,
    color: bool,
}

impl PatternFormatter {
    /// 解析模板
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            segments: parse_pattern(pattern)?,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            color: false,
        })
    }

    /// 设置 `{asctime}` 使用的 chrono 时间格式，无法识别的格式说明符返回 `InvalidArgument`
    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Result<Self> {
        let time_format = time_format.into();
        validate_time_format(&time_format)?;
        self.time_format = time_format;
        Ok(self)
    }

    /// 为级别名称着色
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// 原始模板
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn render_field(&self, placeholder: Placeholder, record: &LogRecord) -> String {
        match placeholder {
            Placeholder::AscTime => {
                let local = record.timestamp.with_timezone(&Local);
                let mut asctime = String::new();
                // 格式已在构造时校验；仍然失败时退回 RFC 3339，不让日志调用 panic
                if write!(asctime, "{}", local.format(&self.time_format)).is_err() {
                    asctime = local.to_rfc3339();
                }
                asctime
            }
            Placeholder::Created => format!("{:.6}", record.timestamp.timestamp_micros() as f64 / 1e6),
            Placeholder::LevelName => record.level.as_str().to_string(),
            Placeholder::LevelNo => record.level.as_u8().to_string(),
            Placeholder::Name => record.logger.clone(),
            Placeholder::Message => record.message.clone(),
            Placeholder::Module => record.module().unwrap_or_default().to_string(),
            Placeholder::FileName => record.file_name().unwrap_or_default().to_string(),
            Placeholder::LineNo => record.line.map_or(String::new(), |l| l.to_string()),
            Placeholder::Thread => record.thread_name.clone().unwrap_or_default(),
            Placeholder::Process => record.process_id.to_string(),
        }
    }
}

impl Default for PatternFormatter {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_FORMAT.to_string(),
            segments: parse_pattern(DEFAULT_FORMAT).unwrap_or_default(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            color: false,
        }
    }
}

impl Formatter for PatternFormatter {
    fn format(&self, record: &LogRecord) -> String {
        let mut result = String::with_capacity(self.pattern.len() + record.message.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => result.push_str(text),
                Segment::Field { placeholder, width } => {
                    let value = self.render_field(*placeholder, record);
                    // 先按原始文本对齐，再着色，避免转义序列影响宽度
                    let padded = match width {
                        Some((Align::Left, w)) => format!("{:<w$}", value, w = *w),
                        Some((Align::Right, w)) => format!("{:>w$}", value, w = *w),
                        None => value,
                    };
                    if self.color && *placeholder == Placeholder::LevelName {
                        result.push_str(&colorize_level(record.level, &padded));
                    } else {
                        result.push_str(&padded);
                    }
                }
            }
        }

        if let Some(ref exception) = record.exception {
            result.push('\n');
            result.push_str(&exception.render());
        }

        result
    }
}

/// JSON 格式化器
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        record
            .to_json()
            .unwrap_or_else(|_| "{\"error\":\"serialization_failed\"}".to_string())
    }
}

/// 检查 chrono 时间格式中是否有无法识别的说明符
pub fn validate_time_format(time_format: &str) -> Result<()> {
    if StrftimeItems::new(time_format).any(|item| matches!(item, Item::Error)) {
        return Err(LogUtilsError::invalid_argument(format!(
            "invalid time format '{}'",
            time_format
        )));
    }
    Ok(())
}

fn colorize_level(level: Level, text: &str) -> String {
    match level {
        Level::Debug => text.cyan().to_string(),
        Level::Info => text.green().to_string(),
        Level::Warning => text.yellow().to_string(),
        Level::Error => text.red().to_string(),
        Level::Critical => text.red().bold().to_string(),
    }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut spec = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    spec.push(c);
                }
                if !closed {
                    return Err(LogUtilsError::invalid_argument(format!(
                        "unterminated placeholder in format '{}'",
                        pattern
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_field(&spec, pattern)?);
            }
            '}' => {
                return Err(LogUtilsError::invalid_argument(format!(
                    "single '}}' in format '{}'",
                    pattern
                )));
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_field(spec: &str, pattern: &str) -> Result<Segment> {
    let (key, width_spec) = match spec.split_once(':') {
        Some((key, width)) => (key, Some(width)),
        None => (spec, None),
    };

    let placeholder = Placeholder::parse(key.trim()).ok_or_else(|| {
        LogUtilsError::invalid_argument(format!(
            "unknown placeholder '{{{}}}' in format '{}'",
            key, pattern
        ))
    })?;

    let width = match width_spec {
        None => None,
        Some(w) => {
            let (align, digits) = if let Some(rest) = w.strip_prefix('<') {
                (Align::Left, rest)
            } else if let Some(rest) = w.strip_prefix('>') {
                (Align::Right, rest)
            } else {
                (Align::Left, w)
            };
            let width = digits.parse::<usize>().map_err(|_| {
                LogUtilsError::invalid_argument(format!(
                    "invalid width '{}' in format '{}'",
                    w, pattern
                ))
            })?;
            Some((align, width))
        }
    };

    Ok(Segment::Field { placeholder, width })
}
