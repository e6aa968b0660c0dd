//! 工具模块
//!
//! 提供错误类型和日志系统。

pub mod error;
pub mod logger;

pub use error::{error_code, CoreError, Result};
