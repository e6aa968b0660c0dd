//! 日志系统模块
//!
//! 基于 tracing 生态实现框架日志，包括：
//!
//! - 多级别日志支持（TRACE, DEBUG, INFO, WARN, ERROR）
//! - 结构化日志（可选 JSON 格式输出）
//! - 文件日志输出（异步非阻塞）
//! - 日志轮转（每天、每小时）
//!
//! # 示例
//!
//! ```rust,no_run
//! use oxgi_core::utils::logger::{Logger, LoggerConfig};
//!
//! let _guard = Logger::init(LoggerConfig::default()).unwrap();
//! tracing::info!(module_id = 3, "模块已解析");
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::utils::{CoreError, Result};

// ============================================================================
// 日志轮转策略
// ============================================================================

/// 日志轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转（单个日志文件）
    Never,
    /// 每小时轮转
    Hourly,
    /// 每天轮转（默认）
    #[default]
    Daily,
}

impl RotationStrategy {
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }

    /// 从字符串解析轮转策略
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "never" | "none" => RotationStrategy::Never,
            "hourly" | "hour" => RotationStrategy::Hourly,
            _ => RotationStrategy::Daily,
        }
    }
}

// ============================================================================
// 日志配置
// ============================================================================

/// 日志系统配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 默认日志级别（"trace" / "debug" / "info" / "warn" / "error"）
    pub level: String,

    /// 是否使用 JSON 格式输出
    pub json_format: bool,

    /// 是否输出到控制台
    pub console_output: bool,

    /// 文件输出目录（None 表示不输出到文件）
    pub file_output: Option<PathBuf>,

    /// 日志文件名前缀
    pub file_prefix: String,

    /// 日志轮转策略
    pub rotation: RotationStrategy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: None,
            file_prefix: "oxgi-core".to_string(),
            rotation: RotationStrategy::Daily,
        }
    }
}

impl LoggerConfig {
    /// 设置日志级别
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// 启用 JSON 格式输出
    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// 设置文件输出目录
    pub fn file_output(mut self, dir: PathBuf) -> Self {
        self.file_output = Some(dir);
        self
    }

    /// 设置轮转策略
    pub fn rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }
}

// ============================================================================
// 日志系统
// ============================================================================

/// 日志守卫
///
/// 持有文件输出的后台写入线程句柄，在内核存活期间必须保持持有。
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 全局初始化标记（重复初始化直接返回空守卫）
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// 日志系统入口
pub struct Logger;

impl Logger {
    /// 初始化日志系统
    ///
    /// # Arguments
    ///
    /// * `config` - 日志配置
    ///
    /// # Returns
    ///
    /// 返回 [`LogGuard`]，调用方需要持有到进程结束。
    /// 重复初始化是无害的，返回一个空守卫。
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        if INITIALIZED.set(()).is_err() {
            return Ok(LogGuard { _file_guard: None });
        }

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.level))
            .map_err(|e| CoreError::InitFailed(format!("无效的日志级别 '{}': {}", config.level, e)))?;

        let mut file_guard = None;

        let file_layer = if let Some(ref dir) = config.file_output {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(
                config.rotation.to_rotation(),
                dir,
                &config.file_prefix,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false))
        } else {
            None
        };

        let registry = tracing_subscriber::registry().with(filter).with(file_layer);

        if config.console_output {
            if config.json_format {
                registry.with(fmt::layer().with_writer(io::stdout).json()).init();
            } else {
                registry.with(fmt::layer().with_writer(io::stdout)).init();
            }
        } else {
            registry.init();
        }

        Ok(LogGuard { _file_guard: file_guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_parse() {
        assert_eq!(RotationStrategy::parse("never"), RotationStrategy::Never);
        assert_eq!(RotationStrategy::parse("hourly"), RotationStrategy::Hourly);
        assert_eq!(RotationStrategy::parse("daily"), RotationStrategy::Daily);
        assert_eq!(RotationStrategy::parse("unknown"), RotationStrategy::Daily);
    }

    #[test]
    fn test_config_builder() {
        let config = LoggerConfig::default()
            .level("debug")
            .json_format(true)
            .rotation(RotationStrategy::Hourly);

        assert_eq!(config.level, "debug");
        assert!(config.json_format);
        assert_eq!(config.rotation, RotationStrategy::Hourly);
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        let first = Logger::init(LoggerConfig::default());
        assert!(first.is_ok());
        let second = Logger::init(LoggerConfig::default());
        assert!(second.is_ok());
    }
}
