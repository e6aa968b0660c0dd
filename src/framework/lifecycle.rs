//! Bundle 生命周期协调器
//!
//! 驱动解析器与加载器图完成 Bundle 的安装、解析、启动、停止、
//! 更新、卸载与刷新。状态机：
//!
//! ```text
//! INSTALLED -> RESOLVED -> STARTING -> ACTIVE -> STOPPING -> RESOLVED
//!     |                                                          |
//!     +------------------- UNINSTALLED <------------------------+
//! ```
//!
//! 安装一个无法解析的 Bundle 是成功的；解析失败在 start（或显式
//! resolve）时才浮出。

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};

use async_trait::async_trait;
use semver::Version;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::config::FrameworkConfig;
use crate::framework::events::{event_type, EventBus, FrameworkEvent};
use crate::loader::content::{ContentSource, DirContent, MemoryContent};
use crate::loader::graph::{BaseLoader, BootLoader, LoaderGraph};
use crate::loader::node::ClassRef;
use crate::module::descriptor::{Capability, ModuleDescriptor, ModuleId};
use crate::module::parser;
use crate::module::resolver::Resolver;
use crate::module::state::ResolverState;
use crate::utils::{CoreError, Result};

// ============================================================================
// Bundle 状态机
// ============================================================================

/// Bundle 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    /// 已安装，未解析
    Installed,
    /// 已解析
    Resolved,
    /// 正在启动
    Starting,
    /// 运行中
    Active,
    /// 正在停止
    Stopping,
    /// 已卸载
    Uninstalled,
}

impl std::fmt::Display for BundleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BundleState::Installed => "INSTALLED",
            BundleState::Resolved => "RESOLVED",
            BundleState::Starting => "STARTING",
            BundleState::Active => "ACTIVE",
            BundleState::Stopping => "STOPPING",
            BundleState::Uninstalled => "UNINSTALLED",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// 激活器
// ============================================================================

/// 激活器回调上下文
#[derive(Debug, Clone)]
pub struct ActivatorContext {
    /// Bundle id
    pub bundle_id: u64,
    /// 符号名
    pub symbolic_name: String,
}

/// Bundle 激活器
///
/// start 失败使 Bundle 回到 RESOLVED；stop 失败不阻止状态迁移。
#[async_trait]
pub trait BundleActivator: Send + Sync {
    /// 启动钩子
    async fn start(&self, ctx: &ActivatorContext) -> Result<()>;

    /// 停止钩子
    async fn stop(&self, ctx: &ActivatorContext) -> Result<()>;
}

// ============================================================================
// Bundle
// ============================================================================

/// 受协调器管理的 Bundle
///
/// Bundle id 跨更新稳定；module id 指向当前修订版。
pub struct Bundle {
    id: u64,
    state: StdRwLock<BundleState>,
    module_id: StdRwLock<ModuleId>,
    symbolic_name: StdRwLock<String>,
    version: StdRwLock<Version>,
    activator: Option<Arc<dyn BundleActivator>>,
    location: Option<PathBuf>,
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("module_id", &self.module_id())
            .field("symbolic_name", &self.symbolic_name())
            .finish()
    }
}

impl Bundle {
    /// Bundle id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 当前状态
    pub fn state(&self) -> BundleState {
        *self.state.read().expect("Bundle 状态锁中毒")
    }

    /// 当前修订版的模块 id
    pub fn module_id(&self) -> ModuleId {
        *self.module_id.read().expect("Bundle 模块锁中毒")
    }

    /// 符号名
    pub fn symbolic_name(&self) -> String {
        self.symbolic_name.read().expect("Bundle 名称锁中毒").clone()
    }

    /// 版本
    pub fn version(&self) -> Version {
        self.version.read().expect("Bundle 版本锁中毒").clone()
    }

    /// 安装来源目录
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    fn set_state(&self, state: BundleState) {
        *self.state.write().expect("Bundle 状态锁中毒") = state;
    }

    fn set_revision(&self, module_id: ModuleId, name: String, version: Version) {
        *self.module_id.write().expect("Bundle 模块锁中毒") = module_id;
        *self.symbolic_name.write().expect("Bundle 名称锁中毒") = name;
        *self.version.write().expect("Bundle 版本锁中毒") = version;
    }
}

// ============================================================================
// 协调器
// ============================================================================

/// Bundle 生命周期协调器
pub struct BundleCoordinator {
    config: FrameworkConfig,
    state: Arc<ResolverState>,
    resolver: Arc<Resolver>,
    graph: Arc<LoaderGraph>,
    events: Arc<EventBus>,
    bundles: RwLock<BTreeMap<u64, Arc<Bundle>>>,
    /// Bundle id 分配（0 保留给系统模块）
    next_bundle_id: AtomicU64,
    /// 等待 refresh 清理的旧修订版模块
    stale: StdRwLock<Vec<ModuleId>>,
}

impl BundleCoordinator {
    /// 用默认基础加载器创建协调器
    pub fn new(config: FrameworkConfig) -> Result<Self> {
        Self::with_base(config, Arc::new(BootLoader::new(Arc::new(MemoryContent::new()))))
    }

    /// 用指定基础加载器创建协调器
    ///
    /// 构造即注册系统模块：导出配置的系统包，立即处于已解析状态。
    pub fn with_base(config: FrameworkConfig, base: Arc<dyn BaseLoader>) -> Result<Self> {
        config.validate()?;

        let state = Arc::new(ResolverState::new());
        let framework_version = env!("CARGO_PKG_VERSION");
        let mut system =
            ModuleDescriptor::system(&config.framework_name, framework_version)?;
        for package in &config.system_packages {
            system = system.with_capability(Capability::package(package, framework_version)?);
        }
        let system_module = state.install_system_module(system)?;

        let resolver = Arc::new(Resolver::new(
            Arc::clone(&state),
            config.execution_environments.clone(),
        ));
        let graph = Arc::new(LoaderGraph::new(
            Arc::clone(&state),
            Arc::clone(&resolver),
            base,
            &config.boot_delegation,
        ));
        // 系统模块的包经引导加载器兑现，自身内容为空
        graph.register_content(system_module.id(), Arc::new(MemoryContent::new()));

        info!(
            framework = %config.framework_name,
            system_packages = config.system_packages.len(),
            "生命周期协调器已创建"
        );
        Ok(Self {
            config,
            state,
            resolver,
            graph,
            events: Arc::new(EventBus::default()),
            bundles: RwLock::new(BTreeMap::new()),
            next_bundle_id: AtomicU64::new(1),
            stale: StdRwLock::new(Vec::new()),
        })
    }

    /// 解析器状态
    pub fn state(&self) -> &Arc<ResolverState> {
        &self.state
    }

    /// 加载器图
    pub fn graph(&self) -> &Arc<LoaderGraph> {
        &self.graph
    }

    /// 事件总线
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // ==================== 安装 ====================

    /// 安装 Bundle
    ///
    /// 不触发解析：依赖无法满足的 Bundle 也安装成功。
    pub async fn install(
        &self,
        descriptor: ModuleDescriptor,
        content: Arc<dyn ContentSource>,
        activator: Option<Arc<dyn BundleActivator>>,
    ) -> Result<Arc<Bundle>> {
        self.install_at(descriptor, content, activator, None).await
    }

    async fn install_at(
        &self,
        descriptor: ModuleDescriptor,
        content: Arc<dyn ContentSource>,
        activator: Option<Arc<dyn BundleActivator>>,
        location: Option<PathBuf>,
    ) -> Result<Arc<Bundle>> {
        let mut bundles = self.bundles.write().await;
        for existing in bundles.values() {
            if existing.state() != BundleState::Uninstalled
                && existing.symbolic_name() == descriptor.symbolic_name
                && existing.version() == descriptor.version
            {
                return Err(CoreError::DuplicateBundle {
                    name: descriptor.symbolic_name.clone(),
                    version: descriptor.version.to_string(),
                });
            }
        }

        let symbolic_name = descriptor.symbolic_name.clone();
        let version = descriptor.version.clone();
        let module = self.state.add_module(Arc::new(descriptor))?;
        self.graph.register_content(module.id(), content);

        let bundle_id = self.next_bundle_id.fetch_add(1, Ordering::SeqCst);
        let bundle = Arc::new(Bundle {
            id: bundle_id,
            state: StdRwLock::new(BundleState::Installed),
            module_id: StdRwLock::new(module.id()),
            symbolic_name: StdRwLock::new(symbolic_name.clone()),
            version: StdRwLock::new(version),
            activator,
            location,
        });
        bundles.insert(bundle_id, Arc::clone(&bundle));
        drop(bundles);

        info!(bundle_id, symbolic_name = %symbolic_name, "Bundle 已安装");
        self.events.publish(FrameworkEvent::bundle(
            event_type::BUNDLE_INSTALLED,
            bundle_id,
            &symbolic_name,
        ));
        Ok(bundle)
    }

    /// 从目录安装 Bundle（目录内须有 `bundle.yaml`）
    pub async fn install_from_dir(
        &self,
        dir: impl AsRef<Path>,
        activator: Option<Arc<dyn BundleActivator>>,
    ) -> Result<Arc<Bundle>> {
        let dir = dir.as_ref();
        let descriptor = parser::parse_file(dir.join("bundle.yaml")).await?;
        self.install_at(
            descriptor,
            Arc::new(DirContent::new(dir)),
            activator,
            Some(dir.to_path_buf()),
        )
        .await
    }

    /// 扫描配置的 Bundle 目录并安装发现的所有 Bundle
    ///
    /// 单个 Bundle 安装失败不中断扫描。
    pub async fn scan_bundle_dirs(&self) -> Vec<Arc<Bundle>> {
        let mut installed = Vec::new();
        for dir in self.config.bundle_dirs.clone() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Bundle 目录不可读，跳过");
                    continue;
                }
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if !path.join("bundle.yaml").is_file() {
                    continue;
                }
                match self.install_from_dir(&path, None).await {
                    Ok(bundle) => installed.push(bundle),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Bundle 安装失败，跳过");
                    }
                }
            }
        }
        info!(count = installed.len(), "Bundle 目录扫描完成");
        installed
    }

    // ==================== 解析与启动 ====================

    /// 显式解析 Bundle
    pub async fn resolve_bundle(&self, bundle_id: u64) -> Result<()> {
        let bundle = self.get(bundle_id).await?;
        if bundle.state() == BundleState::Uninstalled {
            return Err(self.illegal_state(&bundle, "resolve"));
        }

        match self.resolver.resolve(bundle.module_id()) {
            Ok(()) => {
                if bundle.state() == BundleState::Installed {
                    bundle.set_state(BundleState::Resolved);
                }
                self.events.publish(FrameworkEvent::bundle(
                    event_type::BUNDLE_RESOLVED,
                    bundle_id,
                    &bundle.symbolic_name(),
                ));
                Ok(())
            }
            Err(e) => {
                self.events.publish(
                    FrameworkEvent::bundle(
                        event_type::RESOLVE_FAILED,
                        bundle_id,
                        &bundle.symbolic_name(),
                    )
                    .with_detail(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// 启动 Bundle
    ///
    /// 未解析的 Bundle 先解析，解析失败在这里浮出。
    pub async fn start(&self, bundle_id: u64) -> Result<()> {
        let bundle = self.get(bundle_id).await?;
        match bundle.state() {
            BundleState::Uninstalled => return Err(self.illegal_state(&bundle, "start")),
            BundleState::Active => return Ok(()),
            _ => {}
        }
        if let Some(module) = self.state.get(bundle.module_id()) {
            if module.is_fragment() {
                return Err(self.illegal_state(&bundle, "start"));
            }
        }

        if bundle.state() == BundleState::Installed {
            self.resolve_bundle(bundle_id).await?;
        }

        bundle.set_state(BundleState::Starting);
        if let Some(activator) = &bundle.activator {
            let ctx = ActivatorContext {
                bundle_id,
                symbolic_name: bundle.symbolic_name(),
            };
            if let Err(e) = activator.start(&ctx).await {
                bundle.set_state(BundleState::Resolved);
                return Err(CoreError::ActivatorFailed {
                    bundle: bundle.symbolic_name(),
                    hook: "start".to_string(),
                    reason: e.to_string(),
                });
            }
        }
        bundle.set_state(BundleState::Active);
        info!(bundle_id, symbolic_name = %bundle.symbolic_name(), "Bundle 已启动");
        self.events.publish(FrameworkEvent::bundle(
            event_type::BUNDLE_STARTED,
            bundle_id,
            &bundle.symbolic_name(),
        ));
        Ok(())
    }

    /// 停止 Bundle（非运行状态是无害的空操作）
    pub async fn stop(&self, bundle_id: u64) -> Result<()> {
        let bundle = self.get(bundle_id).await?;
        match bundle.state() {
            BundleState::Uninstalled => return Err(self.illegal_state(&bundle, "stop")),
            BundleState::Active => {}
            _ => return Ok(()),
        }

        bundle.set_state(BundleState::Stopping);
        let mut stop_error = None;
        if let Some(activator) = &bundle.activator {
            let ctx = ActivatorContext {
                bundle_id,
                symbolic_name: bundle.symbolic_name(),
            };
            if let Err(e) = activator.stop(&ctx).await {
                stop_error = Some(e);
            }
        }
        // stop 钩子失败不阻止状态迁移
        bundle.set_state(BundleState::Resolved);
        info!(bundle_id, symbolic_name = %bundle.symbolic_name(), "Bundle 已停止");
        self.events.publish(FrameworkEvent::bundle(
            event_type::BUNDLE_STOPPED,
            bundle_id,
            &bundle.symbolic_name(),
        ));

        match stop_error {
            None => Ok(()),
            Some(e) => Err(CoreError::ActivatorFailed {
                bundle: bundle.symbolic_name(),
                hook: "stop".to_string(),
                reason: e.to_string(),
            }),
        }
    }

    // ==================== 更新与卸载 ====================

    /// 更新 Bundle 到新修订版
    ///
    /// 旧修订版仍被其他已解析模块连线引用时保留到 refresh；
    /// 更新前处于运行状态的 Bundle 会用新修订版重新启动。
    pub async fn update(
        &self,
        bundle_id: u64,
        descriptor: ModuleDescriptor,
        content: Arc<dyn ContentSource>,
    ) -> Result<()> {
        let bundle = self.get(bundle_id).await?;
        if bundle.state() == BundleState::Uninstalled {
            return Err(self.illegal_state(&bundle, "update"));
        }

        // 与安装一致：新修订版不得与其他在册 Bundle 重名同版本
        {
            let bundles = self.bundles.read().await;
            for existing in bundles.values() {
                if existing.id() != bundle_id
                    && existing.state() != BundleState::Uninstalled
                    && existing.symbolic_name() == descriptor.symbolic_name
                    && existing.version() == descriptor.version
                {
                    return Err(CoreError::DuplicateBundle {
                        name: descriptor.symbolic_name.clone(),
                        version: descriptor.version.to_string(),
                    });
                }
            }
        }

        let was_active = bundle.state() == BundleState::Active;
        if was_active {
            if let Err(e) = self.stop(bundle_id).await {
                warn!(bundle_id, error = %e, "更新前停止失败，继续更新");
            }
        }

        let old_module_id = bundle.module_id();
        let symbolic_name = descriptor.symbolic_name.clone();
        let version = descriptor.version.clone();
        let module = self.state.add_module(Arc::new(descriptor))?;
        self.graph.register_content(module.id(), content);
        bundle.set_revision(module.id(), symbolic_name.clone(), version);
        bundle.set_state(BundleState::Installed);

        self.retire_module(old_module_id);

        info!(bundle_id, symbolic_name = %symbolic_name, new_module_id = %module.id(), "Bundle 已更新");
        self.events.publish(FrameworkEvent::bundle(
            event_type::BUNDLE_UPDATED,
            bundle_id,
            &symbolic_name,
        ));

        if was_active {
            self.start(bundle_id).await?;
        }
        Ok(())
    }

    /// 卸载 Bundle
    ///
    /// 模块仍被依赖方连线引用时延迟到 refresh 再移除。
    pub async fn uninstall(&self, bundle_id: u64) -> Result<()> {
        let bundle = self.get(bundle_id).await?;
        if bundle.state() == BundleState::Uninstalled {
            return Err(self.illegal_state(&bundle, "uninstall"));
        }

        if bundle.state() == BundleState::Active {
            if let Err(e) = self.stop(bundle_id).await {
                warn!(bundle_id, error = %e, "卸载前停止失败，继续卸载");
            }
        }

        self.retire_module(bundle.module_id());
        bundle.set_state(BundleState::Uninstalled);

        info!(bundle_id, symbolic_name = %bundle.symbolic_name(), "Bundle 已卸载");
        self.events.publish(FrameworkEvent::bundle(
            event_type::BUNDLE_UNINSTALLED,
            bundle_id,
            &bundle.symbolic_name(),
        ));
        Ok(())
    }

    /// 退役模块：无依赖方立即移除，否则留给 refresh
    fn retire_module(&self, module_id: ModuleId) {
        match self.state.remove_module(module_id, false) {
            Ok(()) => self.graph.drop_module(module_id),
            Err(CoreError::WiredDependents { module, dependents }) => {
                debug!(module = %module, ?dependents, "模块仍被连线引用，延迟到 refresh");
                self.stale.write().expect("旧修订表锁中毒").push(module_id);
            }
            Err(e) => warn!(module_id = %module_id, error = %e, "退役模块失败"),
        }
    }

    /// 刷新：清理旧修订版并重算受影响 Bundle 的连线
    ///
    /// 受影响的运行中 Bundle 先停止，刷新后重新解析并启动；
    /// 重启失败的 Bundle 留在 INSTALLED，错误通过事件报告。
    pub async fn refresh(&self) -> Result<()> {
        let stale: Vec<ModuleId> =
            std::mem::take(&mut *self.stale.write().expect("旧修订表锁中毒"));
        if stale.is_empty() {
            return Ok(());
        }

        // 受影响集合 = 旧修订版的传递依赖方（含附着 Fragment）
        let mut affected: HashSet<ModuleId> = stale.iter().copied().collect();
        loop {
            let mut grew = false;
            for module in self.state.modules() {
                if affected.contains(&module.id()) {
                    continue;
                }
                let Some(wiring) = module.wiring() else { continue };
                let touches = wiring.wires.iter().any(|w| affected.contains(&w.exporter))
                    || wiring.host.map(|h| affected.contains(&h)).unwrap_or(false)
                    || wiring.fragments.iter().any(|f| affected.contains(f));
                if touches {
                    affected.insert(module.id());
                    grew = true;
                }
            }
            if !grew {
                break;
            }
        }
        info!(stale = stale.len(), affected = affected.len(), "开始刷新");

        // 停止受影响的运行中 Bundle
        let bundles: Vec<Arc<Bundle>> = self.bundles.read().await.values().cloned().collect();
        let mut to_restart = Vec::new();
        for bundle in &bundles {
            if !affected.contains(&bundle.module_id())
                || bundle.state() == BundleState::Uninstalled
            {
                continue;
            }
            if bundle.state() == BundleState::Active {
                if let Err(e) = self.stop(bundle.id()).await {
                    warn!(bundle_id = bundle.id(), error = %e, "刷新停止失败");
                }
                to_restart.push(bundle.id());
            }
            bundle.set_state(BundleState::Installed);
        }

        // 撤销受影响模块的连线，移除旧修订版
        let stale_set: HashSet<ModuleId> = stale.iter().copied().collect();
        for id in &affected {
            if stale_set.contains(id) {
                continue;
            }
            if let Some(module) = self.state.get(*id) {
                module.clear_wiring();
            }
            self.graph.drop_node(*id);
        }
        for id in &stale {
            self.graph.drop_module(*id);
            if let Err(e) = self.state.remove_module(*id, true) {
                warn!(module_id = %id, error = %e, "移除旧修订版失败");
            }
        }

        // 重启之前运行中的 Bundle
        for bundle_id in to_restart {
            if let Err(e) = self.start(bundle_id).await {
                warn!(bundle_id, error = %e, "刷新后重启失败");
            }
        }
        info!("刷新完成");
        Ok(())
    }

    // ==================== 类与资源 ====================

    /// 经 Bundle 加载类（未解析的 Bundle 先解析）
    pub async fn load_class(&self, bundle_id: u64, class_name: &str) -> Result<ClassRef> {
        let bundle = self.get(bundle_id).await?;
        if bundle.state() == BundleState::Uninstalled {
            return Err(self.illegal_state(&bundle, "load_class"));
        }
        if bundle.state() == BundleState::Installed {
            self.resolve_bundle(bundle_id).await?;
        }
        self.graph.load_class(bundle.module_id(), class_name)
    }

    /// 经 Bundle 读取资源
    pub async fn get_resource(&self, bundle_id: u64, path: &str) -> Result<Vec<u8>> {
        let bundle = self.get(bundle_id).await?;
        if bundle.state() == BundleState::Uninstalled {
            return Err(self.illegal_state(&bundle, "get_resource"));
        }
        if bundle.state() == BundleState::Installed {
            self.resolve_bundle(bundle_id).await?;
        }
        self.graph.get_resource(bundle.module_id(), path)
    }

    // ==================== 框架级操作 ====================

    /// 启动框架：扫描目录、尽力解析全部 Bundle
    pub async fn start_framework(&self) -> Result<()> {
        self.scan_bundle_dirs().await;
        let failures = self.resolver.resolve_all();
        for (module_id, error) in &failures {
            self.events.publish(
                FrameworkEvent::framework(event_type::RESOLVE_FAILED)
                    .with_detail(format!("模块 id {}: {}", module_id, error)),
            );
        }
        // 已解析 Bundle 的状态跟进
        for bundle in self.bundles.read().await.values() {
            if bundle.state() == BundleState::Installed {
                if let Some(module) = self.state.get(bundle.module_id()) {
                    if module.is_resolved() {
                        bundle.set_state(BundleState::Resolved);
                    }
                }
            }
        }
        info!(unresolved = failures.len(), "框架已启动");
        self.events
            .publish(FrameworkEvent::framework(event_type::FRAMEWORK_STARTED));
        Ok(())
    }

    /// 停止框架：按安装逆序停止所有运行中的 Bundle
    pub async fn shutdown(&self) -> Result<()> {
        let ids: Vec<u64> = self.bundles.read().await.keys().rev().copied().collect();
        for bundle_id in ids {
            let bundle = self.get(bundle_id).await?;
            if bundle.state() == BundleState::Active {
                if let Err(e) = self.stop(bundle_id).await {
                    warn!(bundle_id, error = %e, "关停时停止 Bundle 失败");
                }
            }
        }
        info!("框架已停止");
        self.events
            .publish(FrameworkEvent::framework(event_type::FRAMEWORK_STOPPED));
        Ok(())
    }

    // ==================== 查询 ====================

    /// 按 id 取 Bundle
    pub async fn get(&self, bundle_id: u64) -> Result<Arc<Bundle>> {
        self.bundles
            .read()
            .await
            .get(&bundle_id)
            .cloned()
            .ok_or(CoreError::BundleNotFound(bundle_id))
    }

    /// 所有 Bundle（按安装顺序）
    pub async fn bundles(&self) -> Vec<Arc<Bundle>> {
        self.bundles.read().await.values().cloned().collect()
    }

    /// 按符号名查找第一个未卸载的 Bundle
    pub async fn find_by_name(&self, symbolic_name: &str) -> Option<Arc<Bundle>> {
        self.bundles
            .read()
            .await
            .values()
            .find(|b| {
                b.state() != BundleState::Uninstalled && b.symbolic_name() == symbolic_name
            })
            .cloned()
    }

    fn illegal_state(&self, bundle: &Bundle, operation: &str) -> CoreError {
        CoreError::IllegalState {
            bundle: bundle.symbolic_name(),
            state: bundle.state().to_string(),
            operation: operation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::descriptor::Requirement;
    use std::sync::atomic::AtomicUsize;

    struct CountingActivator {
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: bool,
    }

    impl CountingActivator {
        fn new(fail_start: bool) -> Arc<Self> {
            Arc::new(Self {
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                fail_start,
            })
        }
    }

    #[async_trait]
    impl BundleActivator for CountingActivator {
        async fn start(&self, _ctx: &ActivatorContext) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(CoreError::Internal("启动钩子故意失败".to_string()));
            }
            Ok(())
        }

        async fn stop(&self, _ctx: &ActivatorContext) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn coordinator() -> BundleCoordinator {
        BundleCoordinator::new(FrameworkConfig::default()).unwrap()
    }

    fn empty_content() -> Arc<dyn ContentSource> {
        Arc::new(MemoryContent::new())
    }

    #[tokio::test]
    async fn test_install_and_query() {
        let c = coordinator();
        let bundle = c
            .install(
                ModuleDescriptor::bundle("a", "1.0").unwrap(),
                empty_content(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(bundle.state(), BundleState::Installed);
        assert_eq!(bundle.symbolic_name(), "a");
        assert!(c.find_by_name("a").await.is_some());
        assert!(matches!(
            c.get(999).await,
            Err(CoreError::BundleNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_install_rejected() {
        let c = coordinator();
        c.install(
            ModuleDescriptor::bundle("a", "1.0").unwrap(),
            empty_content(),
            None,
        )
        .await
        .unwrap();

        let result = c
            .install(
                ModuleDescriptor::bundle("a", "1.0").unwrap(),
                empty_content(),
                None,
            )
            .await;
        assert!(matches!(result, Err(CoreError::DuplicateBundle { .. })));

        // 不同版本允许
        assert!(c
            .install(
                ModuleDescriptor::bundle("a", "2.0").unwrap(),
                empty_content(),
                None,
            )
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_install_unresolvable_succeeds_start_fails() {
        let c = coordinator();
        let bundle = c
            .install(
                ModuleDescriptor::bundle("a", "1.0")
                    .unwrap()
                    .with_requirement(Requirement::import_package("missing", "").unwrap()),
                empty_content(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(bundle.state(), BundleState::Installed);

        let err = c.start(bundle.id()).await.unwrap_err();
        assert!(matches!(err, CoreError::Resolve(_)));
        assert_eq!(bundle.state(), BundleState::Installed);
    }

    #[tokio::test]
    async fn test_start_stop_cycle() {
        let c = coordinator();
        let activator = CountingActivator::new(false);
        let bundle = c
            .install(
                ModuleDescriptor::bundle("a", "1.0").unwrap(),
                empty_content(),
                Some(activator.clone() as Arc<dyn BundleActivator>),
            )
            .await
            .unwrap();

        c.start(bundle.id()).await.unwrap();
        assert_eq!(bundle.state(), BundleState::Active);
        // 重复 start 是空操作
        c.start(bundle.id()).await.unwrap();
        assert_eq!(activator.starts.load(Ordering::SeqCst), 1);

        c.stop(bundle.id()).await.unwrap();
        assert_eq!(bundle.state(), BundleState::Resolved);
        assert_eq!(activator.stops.load(Ordering::SeqCst), 1);
        // 非运行状态的 stop 是空操作
        c.stop(bundle.id()).await.unwrap();
        assert_eq!(activator.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_activator_start_failure_returns_to_resolved() {
        let c = coordinator();
        let bundle = c
            .install(
                ModuleDescriptor::bundle("a", "1.0").unwrap(),
                empty_content(),
                Some(CountingActivator::new(true) as Arc<dyn BundleActivator>),
            )
            .await
            .unwrap();

        let err = c.start(bundle.id()).await.unwrap_err();
        assert!(matches!(err, CoreError::ActivatorFailed { .. }));
        assert_eq!(bundle.state(), BundleState::Resolved);
    }

    #[tokio::test]
    async fn test_fragment_cannot_start() {
        let c = coordinator();
        c.install(
            ModuleDescriptor::bundle("host", "1.0").unwrap(),
            empty_content(),
            None,
        )
        .await
        .unwrap();
        let fragment = c
            .install(
                ModuleDescriptor::fragment(
                    "host.nls",
                    "1.0",
                    Requirement::fragment_host("host", "").unwrap(),
                )
                .unwrap(),
                empty_content(),
                None,
            )
            .await
            .unwrap();

        assert!(matches!(
            c.start(fragment.id()).await,
            Err(CoreError::IllegalState { .. })
        ));
    }

    #[tokio::test]
    async fn test_uninstall_then_operations_rejected() {
        let c = coordinator();
        let bundle = c
            .install(
                ModuleDescriptor::bundle("a", "1.0").unwrap(),
                empty_content(),
                None,
            )
            .await
            .unwrap();

        c.uninstall(bundle.id()).await.unwrap();
        assert_eq!(bundle.state(), BundleState::Uninstalled);
        assert!(matches!(
            c.start(bundle.id()).await,
            Err(CoreError::IllegalState { .. })
        ));
        assert!(matches!(
            c.uninstall(bundle.id()).await,
            Err(CoreError::IllegalState { .. })
        ));
        // 模块已从解析器状态移除
        assert!(c.state().get(bundle.module_id()).is_none());
    }

    #[tokio::test]
    async fn test_system_module_exports_visible() {
        let config = FrameworkConfig::default().with_system_package("org.osgi.framework");
        let c = BundleCoordinator::new(config).unwrap();
        let bundle = c
            .install(
                ModuleDescriptor::bundle("a", "1.0")
                    .unwrap()
                    .with_requirement(
                        Requirement::import_package("org.osgi.framework", "").unwrap(),
                    ),
                empty_content(),
                None,
            )
            .await
            .unwrap();

        c.resolve_bundle(bundle.id()).await.unwrap();
        assert_eq!(bundle.state(), BundleState::Resolved);
        let module = c.state().get(bundle.module_id()).unwrap();
        assert_eq!(
            module.wiring().unwrap().package_exporter("org.osgi.framework"),
            Some(ModuleId(0))
        );
    }
}
