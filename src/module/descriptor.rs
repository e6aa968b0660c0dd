//! 模块描述符定义
//!
//! 定义解析器可见的模块数据模型：能力（Capability）、需求（Requirement）、
//! 版本区间、动态导入模式，以及运行时的 [`Module`] 单元。
//!
//! 不变式：描述符的能力/需求列表构造后不可变，模块上唯一可变的是
//! 解析成功后挂载的连线（[`Wiring`]）。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use semver::Version;

use crate::module::filter::Filter;
use crate::utils::{CoreError, Result};

// ============================================================================
// 基础类型
// ============================================================================

/// 模块唯一标识（按安装顺序单调递增）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 能力/需求的命名空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// 包导出/导入
    Package,
    /// 模块身份（require-bundle）
    Module,
    /// 宿主身份（fragment-host）
    Host,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Package => write!(f, "package"),
            Namespace::Module => write!(f, "module"),
            Namespace::Host => write!(f, "host"),
        }
    }
}

/// 模块种类
///
/// 以带标签的枚举表达 {系统模块, 普通 Bundle, Fragment} 的多态，
/// 不使用继承层次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// 框架自身的合成系统模块
    System,
    /// 普通 Bundle
    Bundle,
    /// Fragment（无独立类加载器，附着到宿主）
    Fragment,
}

/// 需求的解析策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// 必须满足，否则解析失败
    #[default]
    Mandatory,
    /// 可选，无候选时省略连线
    Optional,
}

/// 宿主的 Fragment 附着策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentAttachPolicy {
    /// 允许附着（默认）
    #[default]
    Always,
    /// 禁止附着
    Never,
}

// ============================================================================
// 版本处理
// ============================================================================

/// 宽松解析版本号
///
/// 允许省略 minor/patch 段："1" 和 "1.5" 分别补全为 "1.0.0" 和 "1.5.0"。
pub fn parse_version(s: &str) -> Result<Version> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Version::new(0, 0, 0));
    }
    // 已经是完整 semver（可能带 pre-release/build 段）
    if let Ok(v) = Version::parse(s) {
        return Ok(v);
    }
    let parts: Vec<&str> = s.split('.').collect();
    let padded = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => s.to_string(),
    };
    Ok(Version::parse(&padded)?)
}

/// 版本区间
///
/// 支持 OSGi 区间语法：`[1.0,2.0)`、`(1.0,2.0]`，以及裸版本 `1.5`
/// （表示 `[1.5,∞)`）。空字符串表示任意版本。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    /// 下界
    pub min: Version,
    /// 下界是否包含
    pub min_inclusive: bool,
    /// 上界（None 表示无上界）
    pub max: Option<Version>,
    /// 上界是否包含
    pub max_inclusive: bool,
}

impl VersionRange {
    /// 任意版本
    pub fn any() -> Self {
        Self {
            min: Version::new(0, 0, 0),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
        }
    }

    /// 解析区间表达式
    ///
    /// # 示例
    ///
    /// ```rust
    /// use oxgi_core::module::descriptor::{parse_version, VersionRange};
    ///
    /// let range = VersionRange::parse("[1.0,2.0)").unwrap();
    /// assert!(range.includes(&parse_version("1.5").unwrap()));
    /// assert!(!range.includes(&parse_version("2.0").unwrap()));
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::any());
        }

        let first = s.chars().next().unwrap();
        if first != '[' && first != '(' {
            // 裸版本：下界包含，无上界
            return Ok(Self {
                min: parse_version(s)?,
                min_inclusive: true,
                max: None,
                max_inclusive: false,
            });
        }

        let last = s.chars().last().unwrap();
        if (last != ']' && last != ')') || s.len() < 5 {
            return Err(CoreError::InvalidVersionRange(s.to_string()));
        }

        let inner = &s[1..s.len() - 1];
        let (lo, hi) = inner
            .split_once(',')
            .ok_or_else(|| CoreError::InvalidVersionRange(s.to_string()))?;

        Ok(Self {
            min: parse_version(lo)?,
            min_inclusive: first == '[',
            max: Some(parse_version(hi)?),
            max_inclusive: last == ']',
        })
    }

    /// 检查版本是否落入区间
    pub fn includes(&self, version: &Version) -> bool {
        let lower_ok = if self.min_inclusive {
            *version >= self.min
        } else {
            *version > self.min
        };
        if !lower_ok {
            return false;
        }
        match &self.max {
            None => true,
            Some(max) => {
                if self.max_inclusive {
                    version <= max
                } else {
                    version < max
                }
            }
        }
    }

    /// 是否为"任意版本"区间
    pub fn is_any(&self) -> bool {
        self.min == Version::new(0, 0, 0) && self.min_inclusive && self.max.is_none()
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.max {
            None => {
                if self.is_any() {
                    write!(f, "*")
                } else {
                    write!(f, "{}", self.min)
                }
            }
            Some(max) => write!(
                f,
                "{}{},{}{}",
                if self.min_inclusive { '[' } else { '(' },
                self.min,
                max,
                if self.max_inclusive { ']' } else { ')' },
            ),
        }
    }
}

// ============================================================================
// 能力与需求
// ============================================================================

/// 能力：模块提供的具名供给（包导出、模块身份、宿主身份）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// 命名空间
    pub namespace: Namespace,
    /// 名称（包名或符号名）
    pub name: String,
    /// 版本
    pub version: Version,
    /// 任意属性（过滤器匹配的对象）
    pub attributes: BTreeMap<String, String>,
}

impl Capability {
    /// 创建包导出能力
    pub fn package(name: impl Into<String>, version: &str) -> Result<Self> {
        Ok(Self {
            namespace: Namespace::Package,
            name: name.into(),
            version: parse_version(version)?,
            attributes: BTreeMap::new(),
        })
    }

    /// 创建模块身份能力
    pub fn module_identity(name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: Namespace::Module,
            name: name.into(),
            version,
            attributes: BTreeMap::new(),
        }
    }

    /// 创建宿主身份能力
    pub fn host(name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: Namespace::Host,
            name: name.into(),
            version,
            attributes: BTreeMap::new(),
        }
    }

    /// 附加属性
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// 声明 uses 约束（导出包依赖的其他包列表）
    pub fn with_uses(self, packages: &[&str]) -> Self {
        self.with_attribute("uses", packages.join(","))
    }

    /// 解析 uses 约束
    pub fn uses(&self) -> Vec<&str> {
        match self.attributes.get("uses") {
            None => vec![],
            Some(s) => s.split(',').map(str::trim).filter(|p| !p.is_empty()).collect(),
        }
    }

    /// 过滤器可见的属性视图（附加隐式的 name/version 属性）
    pub fn filter_attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = self.attributes.clone();
        attrs.insert("name".to_string(), self.name.clone());
        attrs.insert("version".to_string(), self.version.to_string());
        attrs
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.namespace, self.name, self.version)
    }
}

/// 需求：模块声明的具名依赖（包导入、require-bundle、fragment-host）
#[derive(Debug, Clone)]
pub struct Requirement {
    /// 命名空间
    pub namespace: Namespace,
    /// 名称（包名或符号名）
    pub name: String,
    /// 版本区间
    pub range: VersionRange,
    /// 解析策略
    pub resolution: Resolution,
    /// 属性过滤器（可选）
    pub filter: Option<Filter>,
}

impl Requirement {
    /// 创建包导入需求
    pub fn import_package(name: impl Into<String>, range: &str) -> Result<Self> {
        Ok(Self {
            namespace: Namespace::Package,
            name: name.into(),
            range: VersionRange::parse(range)?,
            resolution: Resolution::Mandatory,
            filter: None,
        })
    }

    /// 创建 require-bundle 需求
    pub fn require_module(name: impl Into<String>, range: &str) -> Result<Self> {
        Ok(Self {
            namespace: Namespace::Module,
            name: name.into(),
            range: VersionRange::parse(range)?,
            resolution: Resolution::Mandatory,
            filter: None,
        })
    }

    /// 创建 fragment-host 需求
    pub fn fragment_host(name: impl Into<String>, range: &str) -> Result<Self> {
        Ok(Self {
            namespace: Namespace::Host,
            name: name.into(),
            range: VersionRange::parse(range)?,
            resolution: Resolution::Mandatory,
            filter: None,
        })
    }

    /// 设置为可选需求
    pub fn optional(mut self) -> Self {
        self.resolution = Resolution::Optional;
        self
    }

    /// 设置属性过滤器
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// 是否必须满足
    pub fn is_mandatory(&self) -> bool {
        self.resolution == Resolution::Mandatory
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.namespace, self.name, self.range)?;
        if self.resolution == Resolution::Optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// 动态导入模式
///
/// 来自 DynamicImport-Package 头：`*`、`com.acme.*` 或精确包名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicPattern {
    /// 匹配任意包
    Any,
    /// 前缀匹配（`com.acme.*` 匹配 `com.acme` 的所有子包，不含自身）
    Prefix(String),
    /// 精确包名
    Exact(String),
}

impl DynamicPattern {
    /// 从文本模式解析
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s == "*" {
            DynamicPattern::Any
        } else if let Some(prefix) = s.strip_suffix(".*") {
            DynamicPattern::Prefix(prefix.to_string())
        } else {
            DynamicPattern::Exact(s.to_string())
        }
    }

    /// 检查包名是否匹配模式
    pub fn matches(&self, package: &str) -> bool {
        match self {
            DynamicPattern::Any => true,
            DynamicPattern::Prefix(prefix) => package
                .strip_prefix(prefix.as_str())
                .map(|rest| rest.starts_with('.'))
                .unwrap_or(false),
            DynamicPattern::Exact(name) => package == name,
        }
    }
}

impl fmt::Display for DynamicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicPattern::Any => write!(f, "*"),
            DynamicPattern::Prefix(p) => write!(f, "{}.*", p),
            DynamicPattern::Exact(p) => write!(f, "{}", p),
        }
    }
}

// ============================================================================
// 模块描述符
// ============================================================================

/// 模块描述符
///
/// 一个 Bundle 修订版的不可变已解析视图：身份、能力、需求。
/// 由元数据提供方（描述符解析器）构造，解析器/加载器只读消费。
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    /// 符号名
    pub symbolic_name: String,
    /// 版本
    pub version: Version,
    /// 模块种类
    pub kind: ModuleKind,
    /// 是否为单例（同符号名最多一个已解析实例）
    pub singleton: bool,
    /// Fragment 附着策略（仅宿主侧有意义）
    pub fragment_attach: FragmentAttachPolicy,
    /// 要求的执行环境列表（空表示不要求；满足任意一项即可）
    pub execution_environments: Vec<String>,
    /// 能力列表（构造后不可变）
    pub capabilities: Vec<Capability>,
    /// 静态需求列表（构造后不可变，按声明顺序解析）
    pub requirements: Vec<Requirement>,
    /// 动态需求列表（类加载时惰性解析）
    pub dynamic_requirements: Vec<DynamicPattern>,
    /// 宿主需求（当且仅当 Fragment 时存在）
    pub host_requirement: Option<Requirement>,
}

impl ModuleDescriptor {
    /// 创建普通 Bundle 描述符
    ///
    /// 自动附带模块身份能力和宿主身份能力。
    pub fn bundle(symbolic_name: impl Into<String>, version: &str) -> Result<Self> {
        let symbolic_name = symbolic_name.into();
        let version = parse_version(version)?;
        let capabilities = vec![
            Capability::module_identity(symbolic_name.clone(), version.clone()),
            Capability::host(symbolic_name.clone(), version.clone()),
        ];
        Ok(Self {
            symbolic_name,
            version,
            kind: ModuleKind::Bundle,
            singleton: false,
            fragment_attach: FragmentAttachPolicy::Always,
            execution_environments: vec![],
            capabilities,
            requirements: vec![],
            dynamic_requirements: vec![],
            host_requirement: None,
        })
    }

    /// 创建 Fragment 描述符
    pub fn fragment(
        symbolic_name: impl Into<String>,
        version: &str,
        host: Requirement,
    ) -> Result<Self> {
        let symbolic_name = symbolic_name.into();
        let version = parse_version(version)?;
        let capabilities = vec![Capability::module_identity(
            symbolic_name.clone(),
            version.clone(),
        )];
        Ok(Self {
            symbolic_name,
            version,
            kind: ModuleKind::Fragment,
            singleton: false,
            fragment_attach: FragmentAttachPolicy::Always,
            execution_environments: vec![],
            capabilities,
            requirements: vec![],
            dynamic_requirements: vec![],
            host_requirement: Some(host),
        })
    }

    /// 创建系统模块描述符
    pub fn system(symbolic_name: impl Into<String>, version: &str) -> Result<Self> {
        let mut descriptor = Self::bundle(symbolic_name, version)?;
        descriptor.kind = ModuleKind::System;
        Ok(descriptor)
    }

    /// 附加能力
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// 附加静态需求
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// 附加动态导入模式
    pub fn with_dynamic(mut self, pattern: DynamicPattern) -> Self {
        self.dynamic_requirements.push(pattern);
        self
    }

    /// 设置单例标记
    pub fn with_singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    /// 要求执行环境
    pub fn with_execution_environment(mut self, ee: impl Into<String>) -> Self {
        self.execution_environments.push(ee.into());
        self
    }

    /// 是否为 Fragment
    pub fn is_fragment(&self) -> bool {
        self.kind == ModuleKind::Fragment
    }

    /// 导出的包能力
    pub fn exported_packages(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities
            .iter()
            .filter(|c| c.namespace == Namespace::Package)
    }

    /// 宿主身份能力（非 Fragment 才有）
    pub fn host_capability(&self) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.namespace == Namespace::Host)
    }
}

// ============================================================================
// 连线
// ============================================================================

/// 连线：一条已解析的有向导入边
#[derive(Debug, Clone)]
pub struct Wire {
    /// 被满足的需求
    pub requirement: Requirement,
    /// 匹配到的能力
    pub capability: Capability,
    /// 导入方模块
    pub importer: ModuleId,
    /// 导出方模块
    pub exporter: ModuleId,
}

/// 连线集合：一次成功解析的完整结果
#[derive(Debug, Clone, Default)]
pub struct Wiring {
    /// 所有连线（含 Fragment 的宿主连线）
    pub wires: Vec<Wire>,
    /// 附着的 Fragment（按附着顺序 = 安装顺序）
    pub fragments: Vec<ModuleId>,
    /// 附着到的宿主（仅 Fragment 模块的连线集合填写）
    pub host: Option<ModuleId>,
}

impl Wiring {
    /// 查找某个包的导出方
    pub fn package_exporter(&self, package: &str) -> Option<ModuleId> {
        self.wires
            .iter()
            .find(|w| w.requirement.namespace == Namespace::Package && w.capability.name == package)
            .map(|w| w.exporter)
    }
}

// ============================================================================
// 运行时模块
// ============================================================================

/// 解析器可见的运行时模块单元
///
/// 描述符不可变；唯一可变的是解析成功后挂载的连线。
#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    descriptor: Arc<ModuleDescriptor>,
    wiring: RwLock<Option<Arc<Wiring>>>,
    installed_at: DateTime<Utc>,
}

impl Module {
    /// 创建运行时模块（由解析器状态分配 id）
    pub(crate) fn new(id: ModuleId, descriptor: Arc<ModuleDescriptor>) -> Self {
        Self {
            id,
            descriptor,
            wiring: RwLock::new(None),
            installed_at: Utc::now(),
        }
    }

    /// 模块 id
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// 模块描述符
    pub fn descriptor(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }

    /// 符号名
    pub fn symbolic_name(&self) -> &str {
        &self.descriptor.symbolic_name
    }

    /// 版本
    pub fn version(&self) -> &Version {
        &self.descriptor.version
    }

    /// 是否为 Fragment
    pub fn is_fragment(&self) -> bool {
        self.descriptor.is_fragment()
    }

    /// 是否已解析
    pub fn is_resolved(&self) -> bool {
        self.wiring.read().expect("wiring 锁中毒").is_some()
    }

    /// 当前连线集合
    pub fn wiring(&self) -> Option<Arc<Wiring>> {
        self.wiring.read().expect("wiring 锁中毒").clone()
    }

    /// 挂载连线（解析成功时由解析器调用）
    pub(crate) fn set_wiring(&self, wiring: Arc<Wiring>) {
        *self.wiring.write().expect("wiring 锁中毒") = Some(wiring);
    }

    /// 撤销连线（刷新时由生命周期协调器调用）
    pub(crate) fn clear_wiring(&self) {
        *self.wiring.write().expect("wiring 锁中毒") = None;
    }

    /// 安装时间
    pub fn installed_at(&self) -> DateTime<Utc> {
        self.installed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== 版本区间测试 ====================

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(parse_version("1").unwrap(), Version::new(1, 0, 0));
        assert_eq!(parse_version("1.5").unwrap(), Version::new(1, 5, 0));
        assert_eq!(parse_version("1.2.3").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("").unwrap(), Version::new(0, 0, 0));
    }

    #[test]
    fn test_version_range_interval() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.includes(&Version::new(1, 0, 0)));
        assert!(range.includes(&Version::new(1, 9, 9)));
        assert!(!range.includes(&Version::new(2, 0, 0)));
        assert!(!range.includes(&Version::new(0, 9, 0)));
    }

    #[test]
    fn test_version_range_exclusive_lower() {
        let range = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!range.includes(&Version::new(1, 0, 0)));
        assert!(range.includes(&Version::new(1, 0, 1)));
        assert!(range.includes(&Version::new(2, 0, 0)));
    }

    #[test]
    fn test_version_range_bare() {
        let range = VersionRange::parse("1.5").unwrap();
        assert!(!range.includes(&Version::new(1, 4, 9)));
        assert!(range.includes(&Version::new(1, 5, 0)));
        assert!(range.includes(&Version::new(99, 0, 0)));
    }

    #[test]
    fn test_version_range_any() {
        let range = VersionRange::parse("").unwrap();
        assert!(range.is_any());
        assert!(range.includes(&Version::new(0, 0, 1)));
    }

    #[test]
    fn test_version_range_invalid() {
        assert!(VersionRange::parse("[1.0 2.0)").is_err());
        assert!(VersionRange::parse("[1.0,2.0").is_err());
    }

    #[test]
    fn test_version_range_display_roundtrip() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert_eq!(range.to_string(), "[1.0.0,2.0.0)");
        let reparsed = VersionRange::parse(&range.to_string()).unwrap();
        assert_eq!(range, reparsed);
    }

    // ==================== 动态模式测试 ====================

    #[test]
    fn test_dynamic_pattern_any() {
        let p = DynamicPattern::parse("*");
        assert!(p.matches("com.acme"));
        assert!(p.matches("x"));
    }

    #[test]
    fn test_dynamic_pattern_prefix() {
        let p = DynamicPattern::parse("com.acme.*");
        assert!(p.matches("com.acme.widgets"));
        assert!(p.matches("com.acme.widgets.impl"));
        assert!(!p.matches("com.acme"));
        assert!(!p.matches("com.acmeplus.widgets"));
    }

    #[test]
    fn test_dynamic_pattern_exact() {
        let p = DynamicPattern::parse("com.acme");
        assert!(p.matches("com.acme"));
        assert!(!p.matches("com.acme.widgets"));
    }

    // ==================== 能力/需求测试 ====================

    #[test]
    fn test_capability_uses() {
        let cap = Capability::package("p1", "1.0")
            .unwrap()
            .with_uses(&["p2", "p3"]);
        assert_eq!(cap.uses(), vec!["p2", "p3"]);

        let plain = Capability::package("p1", "1.0").unwrap();
        assert!(plain.uses().is_empty());
    }

    #[test]
    fn test_capability_filter_attributes() {
        let cap = Capability::package("p1", "1.2")
            .unwrap()
            .with_attribute("vendor", "acme");
        let attrs = cap.filter_attributes();
        assert_eq!(attrs.get("name").map(String::as_str), Some("p1"));
        assert_eq!(attrs.get("version").map(String::as_str), Some("1.2.0"));
        assert_eq!(attrs.get("vendor").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_requirement_display() {
        let req = Requirement::import_package("p1", "[1.0,2.0)").unwrap();
        assert_eq!(req.to_string(), "package p1 [1.0.0,2.0.0)");

        let opt = Requirement::import_package("p2", "").unwrap().optional();
        assert!(opt.to_string().contains("optional"));
    }

    // ==================== 描述符测试 ====================

    #[test]
    fn test_bundle_descriptor_implicit_capabilities() {
        let desc = ModuleDescriptor::bundle("acme.core", "1.5").unwrap();
        // 自动附带模块身份和宿主身份能力
        assert!(desc
            .capabilities
            .iter()
            .any(|c| c.namespace == Namespace::Module && c.name == "acme.core"));
        assert!(desc.host_capability().is_some());
        assert!(!desc.is_fragment());
    }

    #[test]
    fn test_fragment_descriptor() {
        let host = Requirement::fragment_host("acme.core", "[1,2)").unwrap();
        let desc = ModuleDescriptor::fragment("acme.core.nls", "1.0", host).unwrap();
        assert!(desc.is_fragment());
        assert!(desc.host_requirement.is_some());
        // Fragment 没有宿主身份能力
        assert!(desc.host_capability().is_none());
    }

    #[test]
    fn test_descriptor_builder_chain() {
        let desc = ModuleDescriptor::bundle("acme.app", "2.0")
            .unwrap()
            .with_capability(Capability::package("com.acme.api", "2.0").unwrap())
            .with_requirement(Requirement::import_package("com.acme.util", "[1,2)").unwrap())
            .with_dynamic(DynamicPattern::parse("com.plugins.*"))
            .with_singleton(true)
            .with_execution_environment("JavaSE-1.6");

        assert_eq!(desc.exported_packages().count(), 1);
        assert_eq!(desc.requirements.len(), 1);
        assert_eq!(desc.dynamic_requirements.len(), 1);
        assert!(desc.singleton);
        assert_eq!(desc.execution_environments, vec!["JavaSE-1.6"]);
    }

    #[test]
    fn test_module_wiring_mutation() {
        let desc = Arc::new(ModuleDescriptor::bundle("a", "1.0").unwrap());
        let module = Module::new(ModuleId(1), desc);
        assert!(!module.is_resolved());

        module.set_wiring(Arc::new(Wiring::default()));
        assert!(module.is_resolved());
        assert!(module.wiring().is_some());
    }
}
