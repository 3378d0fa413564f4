//! 流 handler：标准错误、标准输出或任意 `Write`

use crate::core::formatter::{Formatter, PatternFormatter};
use crate::core::level::Level;
use crate::core::record::LogRecord;
use crate::diagnostics::init_diagnostics;
use crate::error::Result;
use crate::sinks::traits::{Handler, HandlerKind, HandlerMetadata};
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// 输出流
#[derive(Default)]
pub enum StreamTarget {
    #[default]
    Stderr,
    Stdout,
    Writer(Mutex<Box<dyn Write + Send>>),
}

impl StreamTarget {
    /// 包装任意写入器
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        StreamTarget::Writer(Mutex::new(Box::new(writer)))
    }

    fn label(&self) -> &'static str {
        match self {
            StreamTarget::Stderr => "stderr",
            StreamTarget::Stdout => "stdout",
            StreamTarget::Writer(_) => "writer",
        }
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        match self {
            StreamTarget::Stderr => {
                let mut out = io::stderr().lock();
                writeln!(out, "{}", line)?;
                out.flush()
            }
            StreamTarget::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{}", line)?;
                out.flush()
            }
            StreamTarget::Writer(writer) => {
                let mut out = writer.lock().unwrap_or_else(PoisonError::into_inner);
                writeln!(out, "{}", line)?;
                out.flush()
            }
        }
    }
}

impl fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 写入流的 handler
#[derive(Debug)]
pub struct StreamHandler {
    target: StreamTarget,
    level: Level,
    formatter: Arc<dyn Formatter>,
}

impl StreamHandler {
    pub fn new(target: StreamTarget, level: Level) -> Self {
        Self {
            target,
            level,
            formatter: Arc::new(PatternFormatter::default()),
        }
    }

    /// 替换格式化器
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }
}

impl Handler for StreamHandler {
    fn level(&self) -> Level {
        self.level
    }

    fn emit(&self, record: &LogRecord) -> Result<()> {
        self.target.write_line(&self.formatter.format(record))?;
        init_diagnostics().increment_stream_writes();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stream"
    }

    fn metadata(&self) -> HandlerMetadata {
        HandlerMetadata::new(format!("stream:{}", self.target.label()), HandlerKind::Stream)
    }
}
