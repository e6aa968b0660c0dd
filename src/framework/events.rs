//! 框架事件
//!
//! 生命周期协调器在每次状态迁移后广播事件；订阅方（诊断、
//! 管理工具）各自消费，掉队的订阅方丢失旧事件而不是阻塞框架。

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

/// 事件类型常量
pub mod event_type {
    pub const BUNDLE_INSTALLED: &str = "bundle.installed";
    pub const BUNDLE_RESOLVED: &str = "bundle.resolved";
    pub const BUNDLE_STARTED: &str = "bundle.started";
    pub const BUNDLE_STOPPED: &str = "bundle.stopped";
    pub const BUNDLE_UPDATED: &str = "bundle.updated";
    pub const BUNDLE_UNINSTALLED: &str = "bundle.uninstalled";
    pub const RESOLVE_FAILED: &str = "bundle.resolve_failed";
    pub const FRAMEWORK_STARTED: &str = "framework.started";
    pub const FRAMEWORK_STOPPED: &str = "framework.stopped";
}

/// 框架事件
#[derive(Debug, Clone)]
pub struct FrameworkEvent {
    /// 事件类型（见 [`event_type`]）
    pub event_type: &'static str,
    /// 关联的 Bundle id（框架级事件为 None）
    pub bundle_id: Option<u64>,
    /// 关联的符号名
    pub symbolic_name: Option<String>,
    /// 附加细节（失败原因等）
    pub detail: Option<String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl FrameworkEvent {
    /// 构造 Bundle 级事件
    pub fn bundle(event_type: &'static str, bundle_id: u64, symbolic_name: &str) -> Self {
        Self {
            event_type,
            bundle_id: Some(bundle_id),
            symbolic_name: Some(symbolic_name.to_string()),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    /// 构造框架级事件
    pub fn framework(event_type: &'static str) -> Self {
        Self {
            event_type,
            bundle_id: None,
            symbolic_name: None,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    /// 附加细节
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// 事件总线
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<FrameworkEvent>,
}

impl EventBus {
    /// 创建事件总线
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布事件（无订阅方时静默丢弃）
    pub fn publish(&self, event: FrameworkEvent) {
        trace!(event_type = event.event_type, bundle_id = ?event.bundle_id, "发布框架事件");
        let _ = self.sender.send(event);
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> broadcast::Receiver<FrameworkEvent> {
        self.sender.subscribe()
    }

    /// 当前订阅方数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
