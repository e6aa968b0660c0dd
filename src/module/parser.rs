//! 模块描述符解析器
//!
//! 从 `bundle.yaml` 元数据文件构造 [`ModuleDescriptor`]：
//! 反序列化、校验、再落成不可变描述符。
//!
//! # 文件格式
//!
//! ```yaml
//! symbolic_name: com.acme.widgets
//! version: "1.2.0"
//! singleton: false
//! exports:
//!   - package: com.acme.widgets.api
//!     version: "1.2"
//!     uses: [com.acme.util]
//! imports:
//!   - package: com.acme.util
//!     range: "[1.0,2.0)"
//! dynamic_imports:
//!   - "com.acme.plugins.*"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::module::descriptor::{
    DynamicPattern, FragmentAttachPolicy, ModuleDescriptor, Requirement,
};
use crate::module::descriptor::Capability;
use crate::module::filter::Filter;
use crate::utils::{CoreError, Result};

/// `bundle.yaml` 的顶层结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorFile {
    /// 符号名
    pub symbolic_name: String,
    /// 版本（缺省 "0.0.0"）
    #[serde(default)]
    pub version: String,
    /// 是否单例
    #[serde(default)]
    pub singleton: bool,
    /// Fragment 附着策略："always"（默认）或 "never"
    #[serde(default)]
    pub fragment_attach: Option<String>,
    /// 要求的执行环境
    #[serde(default)]
    pub execution_environments: Vec<String>,
    /// 导出的包
    #[serde(default)]
    pub exports: Vec<ExportEntry>,
    /// 导入的包
    #[serde(default)]
    pub imports: Vec<ImportEntry>,
    /// require-bundle 依赖
    #[serde(default)]
    pub require_bundles: Vec<RequireBundleEntry>,
    /// 动态导入模式
    #[serde(default)]
    pub dynamic_imports: Vec<String>,
    /// 宿主声明（存在即为 Fragment）
    #[serde(default)]
    pub host: Option<HostEntry>,
}

/// 包导出条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEntry {
    /// 包名
    pub package: String,
    /// 导出版本
    #[serde(default)]
    pub version: String,
    /// uses 约束
    #[serde(default)]
    pub uses: Vec<String>,
    /// 任意属性
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// 包导入条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEntry {
    /// 包名
    pub package: String,
    /// 版本区间（缺省任意）
    #[serde(default)]
    pub range: String,
    /// 是否可选
    #[serde(default)]
    pub optional: bool,
    /// 属性过滤器表达式
    #[serde(default)]
    pub filter: Option<String>,
}

/// require-bundle 条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequireBundleEntry {
    /// 目标符号名
    pub name: String,
    /// 版本区间
    #[serde(default)]
    pub range: String,
    /// 是否可选
    #[serde(default)]
    pub optional: bool,
}

/// 宿主声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEntry {
    /// 宿主符号名
    pub name: String,
    /// 版本区间
    #[serde(default)]
    pub range: String,
}

impl DescriptorFile {
    /// 校验并转换为不可变描述符
    pub fn into_descriptor(self) -> Result<ModuleDescriptor> {
        if self.symbolic_name.trim().is_empty() {
            return Err(CoreError::InvalidDescriptor(
                "symbolic_name 不能为空".to_string(),
            ));
        }

        let mut descriptor = match &self.host {
            Some(host) => {
                let host_requirement = Requirement::fragment_host(&host.name, &host.range)?;
                ModuleDescriptor::fragment(&self.symbolic_name, &self.version, host_requirement)?
            }
            None => ModuleDescriptor::bundle(&self.symbolic_name, &self.version)?,
        };

        descriptor.singleton = self.singleton;
        descriptor.fragment_attach = match self.fragment_attach.as_deref() {
            None | Some("always") => FragmentAttachPolicy::Always,
            Some("never") => FragmentAttachPolicy::Never,
            Some(other) => {
                return Err(CoreError::InvalidDescriptor(format!(
                    "未知的 fragment_attach 策略: '{}'",
                    other
                )))
            }
        };
        descriptor.execution_environments = self.execution_environments;

        for export in self.exports {
            if export.package.trim().is_empty() {
                return Err(CoreError::InvalidDescriptor("导出包名不能为空".to_string()));
            }
            let mut capability = Capability::package(&export.package, &export.version)?;
            for (key, value) in export.attributes {
                capability = capability.with_attribute(key, value);
            }
            if !export.uses.is_empty() {
                let uses: Vec<&str> = export.uses.iter().map(String::as_str).collect();
                capability = capability.with_uses(&uses);
            }
            descriptor.capabilities.push(capability);
        }

        for import in self.imports {
            if import.package.trim().is_empty() {
                return Err(CoreError::InvalidDescriptor("导入包名不能为空".to_string()));
            }
            let mut requirement = Requirement::import_package(&import.package, &import.range)?;
            if import.optional {
                requirement = requirement.optional();
            }
            if let Some(expr) = &import.filter {
                requirement = requirement.with_filter(Filter::parse(expr)?);
            }
            descriptor.requirements.push(requirement);
        }

        for require in self.require_bundles {
            let mut requirement = Requirement::require_module(&require.name, &require.range)?;
            if require.optional {
                requirement = requirement.optional();
            }
            descriptor.requirements.push(requirement);
        }

        for pattern in self.dynamic_imports {
            descriptor
                .dynamic_requirements
                .push(DynamicPattern::parse(&pattern));
        }

        Ok(descriptor)
    }
}

/// 从 YAML 文本解析描述符
pub fn parse_str(content: &str) -> Result<ModuleDescriptor> {
    let file: DescriptorFile = serde_yaml::from_str(content)?;
    file.into_descriptor()
}

/// 从文件解析描述符
pub async fn parse_file(path: impl AsRef<Path>) -> Result<ModuleDescriptor> {
    let path = path.as_ref();
    debug!(path = %path.display(), "解析模块描述符文件");
    let content = tokio::fs::read_to_string(path).await?;
    parse_str(&content)
}
