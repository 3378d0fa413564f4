//! 单一文件 handler
//!
//! 文件在构造时打开，路径不可写时立即返回 I/O 错误。每条记录写入后立即刷新。

use crate::core::formatter::{Formatter, PatternFormatter};
use crate::core::level::Level;
use crate::core::record::LogRecord;
use crate::diagnostics::init_diagnostics;
use crate::error::{LogUtilsError, Result};
use crate::sinks::traits::{Handler, HandlerKind, HandlerMetadata};
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// 文件打开模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// 追加到已有内容之后
    #[default]
    Append,
    /// 清空已有内容
    Truncate,
}

/// 写入单一文件的 handler
#[derive(Debug)]
pub struct FileHandler {
    path: PathBuf,
    mode: FileMode,
    level: Level,
    formatter: Arc<dyn Formatter>,
    writer: Mutex<BufWriter<File>>,
}

impl FileHandler {
    /// 打开文件并创建 handler
    pub fn new(path: impl AsRef<Path>, mode: FileMode, level: Level) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(LogUtilsError::invalid_argument("log file path is empty"));
        }

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            FileMode::Append => options.append(true),
            FileMode::Truncate => options.write(true).truncate(true),
        };
        let file = options.open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            mode,
            level,
            formatter: Arc::new(PatternFormatter::default()),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// 替换格式化器
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }
}

impl Handler for FileHandler {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        let line = self.formatter.format(record);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        init_diagnostics().increment_file_writes();
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new(format!("file:{}", self.path.display()), HandlerKind::File)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn plain() -> Arc<dyn Formatter> {
        Arc::new(PatternFormatter::new("{levelname}:{name}:{message}").unwrap())
    }

    #[test]
    fn test_append_mode_keeps_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "old\n").unwrap();

        let handler = FileHandler::new(&path, FileMode::Append, Level::Info)
            .unwrap()
            .with_formatter(plain());
        handler.emit(&LogRecord::new("app", Level::Info, "new")).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\nINFO:app:new\n");
    }

    #[test]
    fn test_truncate_mode_clears_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "old\n").unwrap();

        let handler = FileHandler::new(&path, FileMode::Truncate, Level::Info)
            .unwrap()
            .with_formatter(plain());
        handler.emit(&LogRecord::new("app", Level::Error, "boom")).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ERROR:app:boom\n");
    }

    #[test]
    fn test_invalid_paths() {
        assert!(matches!(
            FileHandler::new("", FileMode::Append, Level::Info),
            Err(LogUtilsError::InvalidArgument(_))
        ));

        let dir = TempDir::new().unwrap();
        // 目录本身不能作为日志文件打开
        assert!(matches!(
            FileHandler::new(dir.path(), FileMode::Append, Level::Info),
            Err(LogUtilsError::IoError { .. })
        ));
        assert!(matches!(
            FileHandler::new(dir.path().join("missing").join("a.log"), FileMode::Append, Level::Info),
            Err(LogUtilsError::IoError { .. })
        ));
    }
}
