//! 核心模块
//!
//! 框架配置。

pub mod config;

pub use config::FrameworkConfig;
