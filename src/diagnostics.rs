//! 内部诊断与指标
//!
//! 进程级的原子计数器，反映日志派发与各类 handler 的写入情况。
//! handler 写入失败不会返回给日志调用方，这里的 `handler_errors` 是观察它们的途径之一。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// 内部诊断与指标数据结构。
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// 创建时间
    start_time: Option<Instant>,

    /// 至少交给一个 handler 的记录数
    records_processed: AtomicU64,

    /// 被 logger 级别过滤掉的记录数
    records_filtered: AtomicU64,

    /// handler 写入失败次数
    handler_errors: AtomicU64,

    /// 数据库写入（INSERT + COMMIT）成功次数
    database_writes: AtomicU64,

    /// 文件写入次数
    file_writes: AtomicU64,

    /// 流写入次数
    stream_writes: AtomicU64,
}

/// 诊断数据的快照，用于外部查询。
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsSnapshot {
    pub uptime: Option<Duration>,
    pub records_processed: u64,
    pub records_filtered: u64,
    pub handler_errors: u64,
    pub database_writes: u64,
    pub file_writes: u64,
    pub stream_writes: u64,
}

impl Diagnostics {
    /// 创建新的诊断实例。
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn increment_records_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_records_filtered(&self) {
        self.records_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_handler_errors(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_database_writes(&self) {
        self.database_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_file_writes(&self) {
        self.file_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stream_writes(&self) {
        self.stream_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取诊断数据的快照。
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            uptime: self.start_time.map(|start| start.elapsed()),
            records_processed: self.records_processed.load(Ordering::Relaxed),
            records_filtered: self.records_filtered.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            database_writes: self.database_writes.load(Ordering::Relaxed),
            file_writes: self.file_writes.load(Ordering::Relaxed),
            stream_writes: self.stream_writes.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器（主要用于测试）。
    pub fn reset(&self) {
        self.records_processed.store(0, Ordering::Relaxed);
        self.records_filtered.store(0, Ordering::Relaxed);
        self.handler_errors.store(0, Ordering::Relaxed);
        self.database_writes.store(0, Ordering::Relaxed);
        self.file_writes.store(0, Ordering::Relaxed);
        self.stream_writes.store(0, Ordering::Relaxed);
    }
}

static GLOBAL_DIAGNOSTICS: OnceLock<Arc<Diagnostics>> = OnceLock::new();

/// 获取（必要时创建）全局诊断实例。
pub fn init_diagnostics() -> Arc<Diagnostics> {
    GLOBAL_DIAGNOSTICS
        .get_or_init(|| Arc::new(Diagnostics::new()))
        .clone()
}

/// 获取全局诊断快照。
pub fn get_diagnostics() -> DiagnosticsSnapshot {
    init_diagnostics().snapshot()
}
