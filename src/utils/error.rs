//! OxGi 内核错误类型定义
//!
//! 本模块定义了框架中使用的所有错误类型。
//! 解析失败使用独立的 [`ResolveError`](crate::module::resolver::ResolveError)
//! 类型承载，便于生命周期协调器检查具体的失败原因。

use thiserror::Error;

use crate::module::resolver::ResolveError;

/// OxGi 内核核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 解析错误 ====================

    /// 模块解析失败（携带可检查的失败详情）
    #[error("模块解析失败: {0}")]
    Resolve(#[from] ResolveError),

    /// 模块未解析（操作要求模块已解析）
    #[error("模块未解析: '{0}'")]
    NotResolved(String),

    /// 模块未找到
    #[error("模块未找到: '{0}'")]
    ModuleNotFound(String),

    /// 模块仍被其他已解析模块连线引用，无法移除
    #[error("模块 '{module}' 仍被以下模块连线引用，无法移除: {dependents:?}")]
    WiredDependents {
        module: String,
        dependents: Vec<String>,
    },

    // ==================== 类加载错误 ====================

    /// 类未找到
    #[error("类未找到: '{class}' (模块 '{module}')")]
    ClassNotFound { class: String, module: String },

    /// 资源未找到
    #[error("资源未找到: '{path}' (模块 '{module}')")]
    ResourceNotFound { path: String, module: String },

    // ==================== 生命周期错误 ====================

    /// Bundle 未找到
    #[error("Bundle 未找到: id {0}")]
    BundleNotFound(u64),

    /// 同名同版本的 Bundle 已安装
    #[error("Bundle 已安装: '{name}' 版本 {version}")]
    DuplicateBundle { name: String, version: String },

    /// 当前状态不允许该操作
    #[error("Bundle '{bundle}' 当前状态 {state} 不允许操作 '{operation}'")]
    IllegalState {
        bundle: String,
        state: String,
        operation: String,
    },

    /// Activator 钩子执行失败
    #[error("Bundle '{bundle}' 的 {hook} 钩子执行失败: {reason}")]
    ActivatorFailed {
        bundle: String,
        hook: String,
        reason: String,
    },

    // ==================== 元数据错误 ====================

    /// 无效的模块描述符
    #[error("无效的模块描述符: {0}")]
    InvalidDescriptor(String),

    /// 无效的属性过滤器表达式
    #[error("无效的过滤器表达式: {0}")]
    InvalidFilter(String),

    /// 无效的版本区间
    #[error("无效的版本区间: '{0}'")]
    InvalidVersionRange(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue { key: String, reason: String },

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 版本解析错误
    #[error("版本解析错误: {0}")]
    VersionParse(#[from] semver::Error),

    // ==================== 通用错误 ====================

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 其他错误
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// 内核操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 解析错误 (RESOLVE-xxx)
    pub const RESOLVE_UNSATISFIED: &str = "RESOLVE-001";
    pub const RESOLVE_SINGLETON: &str = "RESOLVE-002";
    pub const RESOLVE_ENVIRONMENT: &str = "RESOLVE-003";
    pub const RESOLVE_HOST_NOT_FOUND: &str = "RESOLVE-004";
    pub const RESOLVE_USES_CONFLICT: &str = "RESOLVE-005";

    // 类加载错误 (LOADER-xxx)
    pub const LOADER_CLASS_NOT_FOUND: &str = "LOADER-001";
    pub const LOADER_RESOURCE_NOT_FOUND: &str = "LOADER-002";
    pub const LOADER_NOT_RESOLVED: &str = "LOADER-003";

    // 生命周期错误 (BUNDLE-xxx)
    pub const BUNDLE_NOT_FOUND: &str = "BUNDLE-001";
    pub const BUNDLE_DUPLICATE: &str = "BUNDLE-002";
    pub const BUNDLE_ILLEGAL_STATE: &str = "BUNDLE-003";
    pub const BUNDLE_WIRED_DEPENDENTS: &str = "BUNDLE-004";

    // 元数据错误 (METADATA-xxx)
    pub const METADATA_INVALID: &str = "METADATA-001";
    pub const METADATA_FILTER: &str = "METADATA-002";
    pub const METADATA_VERSION_RANGE: &str = "METADATA-003";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Resolve(e) => e.error_code(),
            CoreError::NotResolved(_) => error_code::LOADER_NOT_RESOLVED,
            CoreError::ClassNotFound { .. } => error_code::LOADER_CLASS_NOT_FOUND,
            CoreError::ResourceNotFound { .. } => error_code::LOADER_RESOURCE_NOT_FOUND,
            CoreError::BundleNotFound(_) => error_code::BUNDLE_NOT_FOUND,
            CoreError::DuplicateBundle { .. } => error_code::BUNDLE_DUPLICATE,
            CoreError::IllegalState { .. } => error_code::BUNDLE_ILLEGAL_STATE,
            CoreError::WiredDependents { .. } => error_code::BUNDLE_WIRED_DEPENDENTS,
            CoreError::InvalidDescriptor(_) => error_code::METADATA_INVALID,
            CoreError::InvalidFilter(_) => error_code::METADATA_FILTER,
            CoreError::InvalidVersionRange(_) => error_code::METADATA_VERSION_RANGE,
            CoreError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            CoreError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::ClassNotFound {
            class: "com.acme.Widget".to_string(),
            module: "acme.widgets".to_string(),
        };
        assert!(err.to_string().contains("com.acme.Widget"));
        assert!(err.to_string().contains("acme.widgets"));
    }

    #[test]
    fn test_error_code() {
        let err = CoreError::BundleNotFound(7);
        assert_eq!(err.error_code(), error_code::BUNDLE_NOT_FOUND);

        let err = CoreError::InvalidFilter("(a=".to_string());
        assert_eq!(err.error_code(), error_code::METADATA_FILTER);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }
}
