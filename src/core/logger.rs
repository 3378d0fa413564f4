//! Logger 与 logger 注册表
//!
//! `LoggerRegistry` 按名称管理 logger，以点号分隔的名称构成层级：`app.db` 的父级是
//! `app`，`app` 的父级是 root。注册表通过参数显式传递，只有 crate 根部的便捷函数
//! 才使用进程级的全局实例。
//!
//! 派发规则：
//! 1. logger 的有效级别（自身级别，未设置时沿父级向上查找）决定记录是否产生；
//! 2. 记录依次交给本 logger 及其祖先（`propagate` 为真时）上所有通过级别过滤的 handler；
//! 3. handler 的写入错误交给注册表的 `ErrorHook`，不会返回给调用方。

use crate::core::level::Level;
use crate::core::record::LogRecord;
use crate::diagnostics::init_diagnostics;
use crate::error::{LogUtilsError, Result};
use crate::sinks::traits::{ErrorHook, Handler, StderrErrorHook};
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// root logger 的名称
pub const ROOT_LOGGER_NAME: &str = "root";

/// root logger 的默认级别
pub const DEFAULT_ROOT_LEVEL: Level = Level::Warning;

/// 全局注册表实例
static GLOBAL_REGISTRY: Lazy<LoggerRegistry> = Lazy::new(LoggerRegistry::new);

/// 命名 logger
pub struct Logger {
    name: String,
    level: RwLock<Option<Level>>,
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
    propagate: AtomicBool,
    parent: Option<Arc<Logger>>,
    error_hook: Arc<dyn ErrorHook>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("handlers", &self.handlers().len())
            .field("propagate", &self.propagate())
            .finish()
    }
}

impl Logger {
    fn new(
        name: &str,
        level: Option<Level>,
        parent: Option<Arc<Logger>>,
        error_hook: Arc<dyn ErrorHook>,
    ) -> Self {
        Self {
            name: name.to_string(),
            level: RwLock::new(level),
            handlers: RwLock::new(Vec::new()),
            propagate: AtomicBool::new(true),
            parent,
            error_hook,
        }
    }

    /// logger 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 自身设置的级别，未设置时为 `None`
    pub fn level(&self) -> Option<Level> {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// 设置级别
    pub fn set_level(&self, level: Level) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = Some(level);
    }

    /// 清除自身级别，改为继承父级
    pub fn reset_level(&self) {
        if self.parent.is_some() {
            *self.level.write().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// 有效级别：自身级别，或最近一个设置了级别的祖先的级别
    pub fn effective_level(&self) -> Level {
        let mut current = Some(self);
        while let Some(logger) = current {
            if let Some(level) = logger.level() {
                return level;
            }
            current = logger.parent.as_deref();
        }
        DEFAULT_ROOT_LEVEL
    }

    /// 该级别的记录是否会被产生
    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.effective_level()
    }

    /// 是否把记录传递给父级 logger 的 handler
    pub fn propagate(&self) -> bool {
        self.propagate.load(Ordering::Relaxed)
    }

    pub fn set_propagate(&self, propagate: bool) {
        self.propagate.store(propagate, Ordering::Relaxed);
    }

    /// 父级 logger，root 没有父级
    pub fn parent(&self) -> Option<&Arc<Logger>> {
        self.parent.as_ref()
    }

    /// 挂载 handler。同一个 handler 挂载两次会收到两次记录。
    pub fn add_handler(&self, handler: Arc<dyn Handler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// 移除 handler（按指针比较），返回是否找到
    pub fn remove_handler(&self, handler: &Arc<dyn Handler>) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        handlers.len() != before
    }

    /// 移除所有 handler，返回被移除的 handler
    pub fn clear_handlers(&self) -> Vec<Arc<dyn Handler>> {
        std::mem::take(&mut *self.handlers.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// 当前挂载的 handler 快照
    pub fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) {
        if !self.is_enabled_for(level) {
            init_diagnostics().increment_records_filtered();
            return;
        }
        let location = Location::caller();
        let record = LogRecord::new(self.name.as_str(), level, message)
            .with_location(Some(location.file()), Some(location.line()));
        self.handle(&record);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::Critical, message);
    }

    /// 以 ERROR 级别记录消息，并附带错误链
    #[track_caller]
    pub fn exception(&self, message: impl Into<String>, error: &(dyn StdError + 'static)) {
        if !self.is_enabled_for(Level::Error) {
            init_diagnostics().increment_records_filtered();
            return;
        }
        let location = Location::caller();
        let record = LogRecord::new(self.name.as_str(), Level::Error, message)
            .with_location(Some(location.file()), Some(location.line()))
            .with_exception(error);
        self.handle(&record);
    }

    /// 派发一条外部构建的记录（经过本 logger 的级别过滤）
    pub fn log_record(&self, record: &LogRecord) {
        if !self.is_enabled_for(record.level) {
            init_diagnostics().increment_records_filtered();
            return;
        }
        self.handle(record);
    }

    /// 把记录交给本 logger 及其祖先上的 handler，不再检查 logger 级别
    pub fn handle(&self, record: &LogRecord) {
        let mut delivered = false;
        let mut current = Some(self);

        while let Some(logger) = current {
            // 派发期间不持有锁，handler 内部可以再次记录日志
            for handler in logger.handlers() {
                if !handler.accepts(record) {
                    continue;
                }
                delivered = true;
                if let Err(e) = emit_guarded(handler.as_ref(), record) {
                    self.error_hook.handle_error(handler.name(), record, &e);
                }
            }
            if !logger.propagate() {
                break;
            }
            current = logger.parent.as_deref();
        }

        if delivered {
            init_diagnostics().increment_records_processed();
        }
    }

    /// 刷新本 logger 上的所有 handler
    pub fn flush(&self) {
        for handler in self.handlers() {
            if let Err(e) = handler.flush() {
                let record = LogRecord::new(self.name.as_str(), Level::Error, "flush failed");
                self.error_hook.handle_error(handler.name(), &record, &e);
            }
        }
    }
}

/// 调用 `emit`，把 handler 内的 panic 转换为错误，日志调用点不会因此 unwind
fn emit_guarded(handler: &dyn Handler, record: &LogRecord) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| handler.emit(record))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Err(LogUtilsError::HandlerPanicked(message))
    })
}

/// 规范化 logger 名称：去掉空的层级段，`None` 表示 root
fn normalize_name(name: &str) -> Option<Cow<'_, str>> {
    let has_empty_segment =
        name.is_empty() || name.starts_with('.') || name.ends_with('.') || name.contains("..");
    let name = if has_empty_segment {
        let segments: Vec<&str> = name.split('.').filter(|s| !s.is_empty()).collect();
        Cow::Owned(segments.join("."))
    } else {
        Cow::Borrowed(name)
    };
    match &*name {
        "" | ROOT_LOGGER_NAME => None,
        _ => Some(name),
    }
}

struct RegistryInner {
    root: Arc<Logger>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    error_hook: Arc<dyn ErrorHook>,
}

/// Logger 注册表
///
/// 克隆得到的是同一个注册表的句柄。
#[derive(Clone)]
pub struct LoggerRegistry {
    inner: Arc<RegistryInner>,
}

impl fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("root", &self.inner.root)
            .field("loggers", &self.logger_names())
            .field("error_hook", &self.inner.error_hook)
            .finish()
    }
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerRegistry {
    /// 使用默认错误钩子创建注册表
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// 创建构建器
    pub fn builder() -> LoggerRegistryBuilder {
        LoggerRegistryBuilder::default()
    }

    /// 进程级全局注册表
    pub fn global() -> &'static LoggerRegistry {
        &GLOBAL_REGISTRY
    }

    /// root logger
    pub fn root(&self) -> Arc<Logger> {
        self.inner.root.clone()
    }

    /// 错误钩子
    pub fn error_hook(&self) -> Arc<dyn ErrorHook> {
        self.inner.error_hook.clone()
    }

    /// 获取（必要时创建）logger
    ///
    /// `None`、空字符串和 `"root"` 都指向 root logger。中间层级的 logger 会一并创建。
    /// 空的层级段会被忽略，`"a..b."` 与 `"a.b"` 是同一个 logger。
    pub fn get_logger(&self, name: Option<&str>) -> Arc<Logger> {
        let name = match name.map(normalize_name) {
            None | Some(None) => return self.root(),
            Some(Some(name)) => name,
        };
        let name: &str = &name;

        if let Some(logger) = self
            .inner
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return logger.clone();
        }

        let mut loggers = self
            .inner
            .loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut parent = self.root();
        let boundaries = name
            .match_indices('.')
            .map(|(idx, _)| idx)
            .chain(std::iter::once(name.len()));

        for end in boundaries {
            let prefix = &name[..end];
            let logger = loggers
                .entry(prefix.to_string())
                .or_insert_with(|| {
                    Arc::new(Logger::new(
                        prefix,
                        None,
                        Some(parent.clone()),
                        self.inner.error_hook.clone(),
                    ))
                })
                .clone();
            parent = logger;
        }

        parent
    }

    /// 已创建的 logger 名称（不含 root），按字典序
    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// 刷新所有 logger 上的 handler
    pub fn flush(&self) {
        self.inner.root.flush();
        let loggers: Vec<Arc<Logger>> = self
            .inner
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for logger in loggers {
            logger.flush();
        }
    }
}

/// 注册表构建器
#[derive(Debug, Default)]
pub struct LoggerRegistryBuilder {
    error_hook: Option<Arc<dyn ErrorHook>>,
    root_level: Option<Level>,
}

impl LoggerRegistryBuilder {
    /// 设置 handler 写入失败时的错误钩子
    pub fn error_hook(mut self, hook: Arc<dyn ErrorHook>) -> Self {
        self.error_hook = Some(hook);
        self
    }

    /// 设置 root logger 的初始级别
    pub fn root_level(mut self, level: Level) -> Self {
        self.root_level = Some(level);
        self
    }

    pub fn build(self) -> LoggerRegistry {
        let error_hook = self
            .error_hook
            .unwrap_or_else(|| Arc::new(StderrErrorHook));
        let root = Arc::new(Logger::new(
            ROOT_LOGGER_NAME,
            Some(self.root_level.unwrap_or(DEFAULT_ROOT_LEVEL)),
            None,
            error_hook.clone(),
        ));

        LoggerRegistry {
            inner: Arc::new(RegistryInner {
                root,
                loggers: RwLock::new(HashMap::new()),
                error_hook,
            }),
        }
    }
}
