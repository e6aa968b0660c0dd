//! 解析算法
//!
//! 把未解析模块的需求传递闭包转换为一致的连线集合：
//! 逐个需求按匹配器顺序尝试候选，递归解析候选提供方，
//! 失败时回溯到下一个候选；闭包内循环依赖通过"解析中"
//! 集合容忍。整个闭包要么全部提交，要么全部不提交。
//!
//! 解析全局串行化：并发的 resolve 调用排队执行，
//! 类加载路径只读取已提交的连线，不受影响。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::module::descriptor::{
    Module, ModuleId, ModuleKind, Namespace, Wire, Wiring,
};
use crate::module::matcher;
use crate::module::state::ResolverState;
use crate::utils::{error_code, Result};

/// 解析失败的具体原因
///
/// 生命周期协调器据此决定如何向调用方报告失败；
/// 所有变体都携带足以定位问题的模块/需求信息。
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// 强制需求没有可接受的候选
    #[error("模块 '{module}' 的需求无法满足: {requirement}")]
    Unsatisfied { module: String, requirement: String },

    /// 单例冲突：同符号名的另一个单例已解析或在同一闭包中
    #[error("单例冲突: '{module}' 与已解析的 '{conflicting}' 同名")]
    SingletonCollision { module: String, conflicting: String },

    /// 要求的执行环境均不可用
    #[error("模块 '{module}' 要求的执行环境均不可用: {required:?}")]
    ExecutionEnvironment {
        module: String,
        required: Vec<String>,
    },

    /// Fragment 找不到可附着的宿主
    #[error("Fragment '{fragment}' 无法附着宿主: {detail}")]
    HostNotFound { fragment: String, detail: String },

    /// uses 约束冲突：同一包从两个来源可见
    #[error(
        "uses 约束冲突: 模块 '{module}' 通过包 '{package}' 看到两个导出方 '{exporter_a}' 与 '{exporter_b}'"
    )]
    UsesConflict {
        module: String,
        package: String,
        exporter_a: String,
        exporter_b: String,
    },
}

impl ResolveError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            ResolveError::Unsatisfied { .. } => error_code::RESOLVE_UNSATISFIED,
            ResolveError::SingletonCollision { .. } => error_code::RESOLVE_SINGLETON,
            ResolveError::ExecutionEnvironment { .. } => error_code::RESOLVE_ENVIRONMENT,
            ResolveError::HostNotFound { .. } => error_code::RESOLVE_HOST_NOT_FOUND,
            ResolveError::UsesConflict { .. } => error_code::RESOLVE_USES_CONFLICT,
        }
    }
}

/// 一次解析尝试的中间状态
///
/// 连线先写入 `pending`，全部成功后一次性提交到各模块；
/// 回溯通过克隆/还原整个上下文实现。
#[derive(Debug, Clone, Default)]
struct ResolveContext {
    /// 已完成但未提交的连线集合
    pending: HashMap<ModuleId, Wiring>,
    /// 正在解析中的模块（循环依赖容忍）
    in_progress: HashSet<ModuleId>,
}

impl ResolveContext {
    /// 模块是否已在本次闭包中处理过
    fn contains(&self, id: ModuleId) -> bool {
        self.pending.contains_key(&id) || self.in_progress.contains(&id)
    }
}

/// 模块解析器
#[derive(Debug)]
pub struct Resolver {
    state: Arc<ResolverState>,
    /// 框架提供的执行环境
    environments: Vec<String>,
    /// 解析全局串行化锁
    lock: Mutex<()>,
}

impl Resolver {
    /// 创建解析器
    pub fn new(state: Arc<ResolverState>, environments: Vec<String>) -> Self {
        Self {
            state,
            environments,
            lock: Mutex::new(()),
        }
    }

    /// 解析器状态
    pub fn state(&self) -> &Arc<ResolverState> {
        &self.state
    }

    /// 解析单个模块及其传递闭包
    ///
    /// 对已解析模块是无副作用的空操作。失败时不提交任何连线，
    /// 闭包中的所有模块保持未解析。
    pub fn resolve(&self, id: ModuleId) -> Result<()> {
        let _serial = self.lock.lock().expect("解析串行锁中毒");

        let module = self
            .state
            .get(id)
            .ok_or_else(|| crate::utils::CoreError::ModuleNotFound(format!("id {}", id)))?;
        if module.is_resolved() {
            return Ok(());
        }

        let mut ctx = ResolveContext::default();
        self.resolve_module(&module, &mut ctx)?;
        self.check_uses(&ctx)?;
        self.commit(ctx);
        info!(module_id = %id, symbolic_name = module.symbolic_name(), "模块解析成功");
        Ok(())
    }

    /// 尝试解析所有未解析模块
    ///
    /// 单个模块的失败不影响其他模块，返回失败清单。
    pub fn resolve_all(&self) -> Vec<(ModuleId, crate::utils::CoreError)> {
        let mut failures = Vec::new();
        for module in self.state.modules() {
            if module.is_resolved() {
                continue;
            }
            if let Err(e) = self.resolve(module.id()) {
                warn!(
                    module_id = %module.id(),
                    symbolic_name = module.symbolic_name(),
                    error = %e,
                    "模块解析失败"
                );
                failures.push((module.id(), e));
            }
        }
        failures
    }

    // ==================== 闭包构建 ====================

    fn resolve_module(
        &self,
        module: &Arc<Module>,
        ctx: &mut ResolveContext,
    ) -> std::result::Result<(), ResolveError> {
        if module.is_resolved() || ctx.contains(module.id()) {
            return Ok(());
        }

        if module.is_fragment() {
            return self.resolve_fragment(module, ctx);
        }

        self.check_environment(module)?;
        self.check_singleton(module, ctx)?;

        ctx.in_progress.insert(module.id());
        debug!(module_id = %module.id(), symbolic_name = module.symbolic_name(), "开始解析");

        // 宿主先于 Fragment：先选出要附着的 Fragment，
        // 其需求并入宿主一起解析
        let fragments = self.attachable_fragments(module, ctx);

        let mut wires = Vec::new();
        let mut requirements: Vec<_> = module.descriptor().requirements.clone();
        for fragment in &fragments {
            requirements.extend(fragment.descriptor().requirements.iter().cloned());
        }

        for requirement in &requirements {
            match self.resolve_requirement(module, requirement, ctx)? {
                Some(wire) => wires.push(wire),
                None => {
                    // 可选需求无候选：省略连线
                    debug!(
                        module_id = %module.id(),
                        requirement = %requirement,
                        "可选需求无候选，省略"
                    );
                }
            }
        }

        ctx.in_progress.remove(&module.id());
        let fragment_ids: Vec<ModuleId> = fragments.iter().map(|f| f.id()).collect();
        ctx.pending.insert(
            module.id(),
            Wiring {
                wires,
                fragments: fragment_ids,
                host: None,
            },
        );

        // Fragment 的连线集合只含指向宿主的一条边
        for fragment in fragments {
            let host_requirement = fragment
                .descriptor()
                .host_requirement
                .clone()
                .ok_or_else(|| ResolveError::HostNotFound {
                    fragment: fragment.symbolic_name().to_string(),
                    detail: "描述符缺少宿主需求".to_string(),
                })?;
            let host_capability = module.descriptor().host_capability().cloned().ok_or_else(
                || ResolveError::HostNotFound {
                    fragment: fragment.symbolic_name().to_string(),
                    detail: format!("宿主 '{}' 没有宿主身份能力", module.symbolic_name()),
                },
            )?;
            ctx.pending.insert(
                fragment.id(),
                Wiring {
                    wires: vec![Wire {
                        requirement: host_requirement,
                        capability: host_capability,
                        importer: fragment.id(),
                        exporter: module.id(),
                    }],
                    fragments: vec![],
                    host: Some(module.id()),
                },
            );
        }

        Ok(())
    }

    /// 直接对 Fragment 发起解析：先解析宿主，附着在宿主解析中完成
    fn resolve_fragment(
        &self,
        fragment: &Arc<Module>,
        ctx: &mut ResolveContext,
    ) -> std::result::Result<(), ResolveError> {
        let host = self.state.find_host(fragment).ok_or_else(|| {
            ResolveError::HostNotFound {
                fragment: fragment.symbolic_name().to_string(),
                detail: "没有匹配宿主需求的可附着模块".to_string(),
            }
        })?;

        if host.is_resolved() {
            // 已提交的宿主不能再追加 Fragment，需要 refresh
            return Err(ResolveError::HostNotFound {
                fragment: fragment.symbolic_name().to_string(),
                detail: format!("宿主 '{}' 已解析，附着需要刷新宿主", host.symbolic_name()),
            });
        }

        self.resolve_module(&host, ctx)?;

        if !ctx.pending.contains_key(&fragment.id()) {
            return Err(ResolveError::HostNotFound {
                fragment: fragment.symbolic_name().to_string(),
                detail: format!("宿主 '{}' 解析时未接纳该 Fragment", host.symbolic_name()),
            });
        }
        Ok(())
    }

    /// 解析单个需求，带候选回溯
    ///
    /// 候选按匹配器顺序尝试；候选提供方递归解析失败时，
    /// 还原上下文快照并尝试下一个候选。
    fn resolve_requirement(
        &self,
        importer: &Arc<Module>,
        requirement: &crate::module::descriptor::Requirement,
        ctx: &mut ResolveContext,
    ) -> std::result::Result<Option<Wire>, ResolveError> {
        let closure = self.closure_ids(ctx);
        let candidates =
            matcher::match_requirement(requirement, self.state.candidates(requirement), &closure);

        for candidate in candidates {
            let snapshot = ctx.clone();
            match self.resolve_module(&candidate.module, ctx) {
                Ok(()) => {
                    return Ok(Some(Wire {
                        requirement: requirement.clone(),
                        capability: candidate.capability,
                        importer: importer.id(),
                        exporter: candidate.module.id(),
                    }));
                }
                Err(e) => {
                    debug!(
                        importer = importer.symbolic_name(),
                        candidate = candidate.module.symbolic_name(),
                        error = %e,
                        "候选解析失败，回溯"
                    );
                    *ctx = snapshot;
                }
            }
        }

        if requirement.is_mandatory() {
            Err(ResolveError::Unsatisfied {
                module: importer.symbolic_name().to_string(),
                requirement: requirement.to_string(),
            })
        } else {
            Ok(None)
        }
    }

    /// 当前闭包成员 + 已解析模块（匹配器的偏好集合）
    fn closure_ids(&self, ctx: &ResolveContext) -> HashSet<ModuleId> {
        let mut ids: HashSet<ModuleId> = ctx.pending.keys().copied().collect();
        ids.extend(ctx.in_progress.iter().copied());
        for module in self.state.modules() {
            if module.is_resolved() {
                ids.insert(module.id());
            }
        }
        ids
    }

    // ==================== 前置检查 ====================

    fn check_environment(&self, module: &Arc<Module>) -> std::result::Result<(), ResolveError> {
        let required = &module.descriptor().execution_environments;
        if required.is_empty() {
            return Ok(());
        }
        if required.iter().any(|ee| self.environments.contains(ee)) {
            return Ok(());
        }
        Err(ResolveError::ExecutionEnvironment {
            module: module.symbolic_name().to_string(),
            required: required.clone(),
        })
    }

    fn check_singleton(
        &self,
        module: &Arc<Module>,
        ctx: &ResolveContext,
    ) -> std::result::Result<(), ResolveError> {
        if !module.descriptor().singleton {
            return Ok(());
        }
        // 已提交的同名单例
        if let Some(conflict) = self
            .state
            .resolved_singleton(module.symbolic_name(), module.id())
        {
            return Err(ResolveError::SingletonCollision {
                module: format!("{} {}", module.symbolic_name(), module.version()),
                conflicting: format!("{} {}", conflict.symbolic_name(), conflict.version()),
            });
        }
        // 同一闭包中的同名单例
        for id in ctx.pending.keys().chain(ctx.in_progress.iter()) {
            if let Some(other) = self.state.get(*id) {
                if other.id() != module.id()
                    && other.descriptor().singleton
                    && other.symbolic_name() == module.symbolic_name()
                {
                    return Err(ResolveError::SingletonCollision {
                        module: format!("{} {}", module.symbolic_name(), module.version()),
                        conflicting: format!("{} {}", other.symbolic_name(), other.version()),
                    });
                }
            }
        }
        Ok(())
    }

    /// 挑选要附着到宿主的 Fragment
    ///
    /// 检查 Fragment 自身的执行环境与单例约束，不合格的 Fragment
    /// 留在未解析状态而不是拖垮宿主。
    fn attachable_fragments(
        &self,
        host: &Arc<Module>,
        ctx: &ResolveContext,
    ) -> Vec<Arc<Module>> {
        if host.descriptor().kind == ModuleKind::System {
            return vec![];
        }
        let mut fragments = Vec::new();
        for module in self.state.modules() {
            if !module.is_fragment() || module.is_resolved() || ctx.contains(module.id()) {
                continue;
            }
            let Some(candidate_host) = self.state.find_host(&module) else { continue };
            if candidate_host.id() != host.id() {
                continue;
            }
            if self.check_environment(&module).is_err() {
                warn!(
                    fragment = module.symbolic_name(),
                    "Fragment 执行环境不满足，跳过附着"
                );
                continue;
            }
            if self.check_singleton(&module, ctx).is_err() {
                warn!(fragment = module.symbolic_name(), "Fragment 单例冲突，跳过附着");
                continue;
            }
            fragments.push(module);
        }
        // 附着顺序 = 安装顺序
        fragments.sort_by_key(|f| f.id());
        fragments
    }

    // ==================== uses 一致性 ====================

    /// 对闭包做 uses 约束检查
    ///
    /// 模块 M 通过连线从 E 导入包 p，且 p 声明 uses q 时，
    /// M 自己看到的 q 导出方必须与 E 看到的相同。
    fn check_uses(&self, ctx: &ResolveContext) -> std::result::Result<(), ResolveError> {
        for (id, wiring) in &ctx.pending {
            let Some(module) = self.state.get(*id) else { continue };
            for wire in &wiring.wires {
                if wire.requirement.namespace != Namespace::Package {
                    continue;
                }
                for used in wire.capability.uses() {
                    let importer_view = self.exporter_view(*id, wiring, used, ctx);
                    let exporter_view = self.exporter_view_of(wire.exporter, used, ctx);
                    if let (Some(a), Some(b)) = (importer_view, exporter_view) {
                        if a != b {
                            return Err(ResolveError::UsesConflict {
                                module: module.symbolic_name().to_string(),
                                package: used.to_string(),
                                exporter_a: self.name_of(a),
                                exporter_b: self.name_of(b),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// 模块自身视角下包 q 的导出方：本地导出优先，其次连线
    fn exporter_view(
        &self,
        id: ModuleId,
        wiring: &Wiring,
        package: &str,
        _ctx: &ResolveContext,
    ) -> Option<ModuleId> {
        if let Some(module) = self.state.get(id) {
            if module
                .descriptor()
                .exported_packages()
                .any(|c| c.name == package)
            {
                return Some(id);
            }
        }
        wiring.package_exporter(package)
    }

    /// 任意模块（待提交或已提交）视角下包 q 的导出方
    fn exporter_view_of(
        &self,
        id: ModuleId,
        package: &str,
        ctx: &ResolveContext,
    ) -> Option<ModuleId> {
        if let Some(pending) = ctx.pending.get(&id) {
            return self.exporter_view(id, pending, package, ctx);
        }
        let module = self.state.get(id)?;
        let wiring = module.wiring()?;
        self.exporter_view(id, &wiring, package, ctx)
    }

    fn name_of(&self, id: ModuleId) -> String {
        self.state
            .get(id)
            .map(|m| m.symbolic_name().to_string())
            .unwrap_or_else(|| format!("id {}", id))
    }

    // ==================== 提交 ====================

    fn commit(&self, ctx: ResolveContext) {
        for (id, wiring) in ctx.pending {
            if let Some(module) = self.state.get(id) {
                debug!(
                    module_id = %id,
                    wires = wiring.wires.len(),
                    fragments = wiring.fragments.len(),
                    "提交连线"
                );
                module.set_wiring(Arc::new(wiring));
            }
        }
    }
}
