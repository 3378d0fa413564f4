//! `tracing` 桥接层
//!
//! 把 `tracing` 事件转换为 `LogRecord`，交给注册表中与事件 target 对应的 logger。
//! target 中的 `::` 转换为 `.`，因此 `app::db` 的事件由 `app.db` logger 处理。

use crate::core::level::Level;
use crate::core::logger::LoggerRegistry;
use crate::core::record::LogRecord;
use crate::error::{LogUtilsError, Result};
use std::collections::BTreeMap;
use tracing::Event;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// 将 `tracing` 事件派发到 logger 注册表的层
#[derive(Debug, Clone)]
pub struct LogBridgeLayer {
    registry: LoggerRegistry,
}

impl LogBridgeLayer {
    pub fn new(registry: LoggerRegistry) -> Self {
        Self { registry }
    }

    /// 将 tracing 事件转换为 LogRecord
    fn convert_event(&self, event: &Event<'_>) -> LogRecord {
        let metadata = event.metadata();

        let mut fields = BTreeMap::new();
        let mut message = String::new();

        struct FieldVisitor<'a> {
            fields: &'a mut BTreeMap<String, serde_json::Value>,
            message: &'a mut String,
        }

        impl<'a> tracing::field::Visit for FieldVisitor<'a> {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let value_str = format!("{:?}", value);
                if field.name() == "message" {
                    *self.message = value_str;
                } else {
                    self.fields
                        .insert(field.name().to_string(), serde_json::Value::String(value_str));
                }
            }

            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    *self.message = value.to_string();
                } else {
                    self.fields.insert(
                        field.name().to_string(),
                        serde_json::Value::String(value.to_string()),
                    );
                }
            }

            fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
                self.fields
                    .insert(field.name().to_string(), serde_json::Value::from(value));
            }

            fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
                self.fields
                    .insert(field.name().to_string(), serde_json::Value::from(value));
            }

            fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
                self.fields
                    .insert(field.name().to_string(), serde_json::Value::Bool(value));
            }
        }

        let mut visitor = FieldVisitor {
            fields: &mut fields,
            message: &mut message,
        };
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            logger_name(metadata.target()),
            Level::from(*metadata.level()),
            message,
        )
        .with_location(metadata.file(), metadata.line())
        .with_module_path(metadata.module_path());
        record.fields = fields;
        record
    }
}

impl<S> Layer<S> for LogBridgeLayer
where
    S: tracing::Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // 本 crate 自身的诊断输出不回流到 handler，避免递归
        let target = event.metadata().target();
        if target == "logutils" || target.starts_with("logutils::") {
            return;
        }

        let record = self.convert_event(event);
        self.registry
            .get_logger(Some(&record.logger))
            .log_record(&record);
    }
}

/// target → logger 名称
fn logger_name(target: &str) -> String {
    target.replace("::", ".")
}

/// 安装 `Registry + LogBridgeLayer` 作为全局默认 subscriber
pub fn install_global(registry: LoggerRegistry) -> Result<()> {
    tracing_subscriber::registry()
        .with(LogBridgeLayer::new(registry))
        .try_init()
        .map_err(|e| LogUtilsError::initialization(format!("failed to install tracing bridge: {}", e)))
}
