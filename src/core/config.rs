//! 框架配置
//!
//! 定义框架的可配置项：系统包、引导委派模式、执行环境、
//! Bundle 扫描目录与日志。支持 YAML 文件加载和链式构建。
//!
//! # 示例
//!
//! ```rust
//! use oxgi_core::core::config::FrameworkConfig;
//!
//! let config = FrameworkConfig::default()
//!     .with_boot_delegation("java.*")
//!     .with_execution_environment("JavaSE-1.6");
//! assert!(config.validate().is_ok());
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::logger::{LoggerConfig, RotationStrategy};
use crate::utils::{CoreError, Result};

/// 框架配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    /// 框架符号名（系统模块的符号名）
    #[serde(default = "default_framework_name")]
    pub framework_name: String,

    /// 系统模块导出的包
    #[serde(default)]
    pub system_packages: Vec<String>,

    /// 引导委派的包名模式（`java.*` 等）
    #[serde(default = "default_boot_delegation")]
    pub boot_delegation: Vec<String>,

    /// 框架提供的执行环境
    #[serde(default = "default_execution_environments")]
    pub execution_environments: Vec<String>,

    /// 启动时扫描的 Bundle 目录
    #[serde(default)]
    pub bundle_dirs: Vec<PathBuf>,

    /// 日志配置
    #[serde(default)]
    pub log: LogSection,
}

/// 日志配置段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否 JSON 格式输出
    #[serde(default)]
    pub json_format: bool,
    /// 是否输出到控制台
    #[serde(default = "default_true")]
    pub console_output: bool,
    /// 文件输出目录
    #[serde(default)]
    pub file_output: Option<PathBuf>,
    /// 轮转策略（"never" / "hourly" / "daily"）
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_framework_name() -> String {
    "oxgi.framework".to_string()
}

fn default_boot_delegation() -> Vec<String> {
    vec!["java.*".to_string()]
}

fn default_execution_environments() -> Vec<String> {
    vec!["OxGi-1.0".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            console_output: true,
            file_output: None,
            rotation: default_rotation(),
        }
    }
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            framework_name: default_framework_name(),
            system_packages: vec![],
            boot_delegation: default_boot_delegation(),
            execution_environments: default_execution_environments(),
            bundle_dirs: vec![],
            log: LogSection::default(),
        }
    }
}

impl FrameworkConfig {
    /// 从 YAML 文件加载配置
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| CoreError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!(path = %path.display(), "框架配置已加载");
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.framework_name.trim().is_empty() {
            return Err(CoreError::InvalidConfigValue {
                key: "framework_name".to_string(),
                reason: "不能为空".to_string(),
            });
        }
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log.level.as_str()) {
            return Err(CoreError::InvalidConfigValue {
                key: "log.level".to_string(),
                reason: format!("未知级别 '{}'", self.log.level),
            });
        }
        if !["never", "none", "hourly", "hour", "daily", "day"]
            .contains(&self.log.rotation.to_lowercase().as_str())
        {
            return Err(CoreError::InvalidConfigValue {
                key: "log.rotation".to_string(),
                reason: format!("未知策略 '{}'", self.log.rotation),
            });
        }
        for pattern in &self.boot_delegation {
            if pattern.trim().is_empty() {
                return Err(CoreError::InvalidConfigValue {
                    key: "boot_delegation".to_string(),
                    reason: "模式不能为空".to_string(),
                });
            }
        }
        Ok(())
    }

    /// 转换为日志系统配置
    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            level: self.log.level.clone(),
            json_format: self.log.json_format,
            console_output: self.log.console_output,
            file_output: self.log.file_output.clone(),
            file_prefix: "oxgi-core".to_string(),
            rotation: RotationStrategy::parse(&self.log.rotation),
        }
    }

    // ==================== 链式构建 ====================

    /// 添加系统包
    pub fn with_system_package(mut self, package: impl Into<String>) -> Self {
        self.system_packages.push(package.into());
        self
    }

    /// 添加引导委派模式
    pub fn with_boot_delegation(mut self, pattern: impl Into<String>) -> Self {
        self.boot_delegation.push(pattern.into());
        self
    }

    /// 添加执行环境
    pub fn with_execution_environment(mut self, ee: impl Into<String>) -> Self {
        self.execution_environments.push(ee.into());
        self
    }

    /// 添加 Bundle 扫描目录
    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dirs.push(dir.into());
        self
    }
}
