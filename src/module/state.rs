//! 解析器状态
//!
//! 进程内所有已知模块的全局索引：按命名空间+名称索引能力，
//! 为解析算法提供候选查询，并支持模块的并发安装/移除。
//!
//! 结构性变更（add/remove）与候选读取互斥；安装/卸载相对类加载
//! 流量是低频操作，粗粒度读写锁足够。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::module::descriptor::{
    FragmentAttachPolicy, Module, ModuleDescriptor, ModuleId, ModuleKind, Namespace, Requirement,
};
use crate::module::matcher::{self, Candidate};
use crate::utils::{CoreError, Result};

/// 解析器状态：所有已知模块的索引
#[derive(Debug)]
pub struct ResolverState {
    inner: RwLock<StateInner>,
    next_id: AtomicU64,
}

#[derive(Debug, Default)]
struct StateInner {
    /// 所有模块，按 id 有序（= 安装顺序）
    modules: BTreeMap<ModuleId, Arc<Module>>,
    /// 能力索引：(命名空间, 名称) -> 提供方模块列表
    capability_index: HashMap<(Namespace, String), Vec<ModuleId>>,
    /// 符号名索引
    by_name: HashMap<String, Vec<ModuleId>>,
}

impl ResolverState {
    /// 创建空的解析器状态
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StateInner::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// 注册系统模块
    ///
    /// 框架构造时调用一次，系统模块获得 id 0 并立即标记为已解析
    /// （它没有任何需求）。这是公开的注册入口，取代对内部映射的
    /// 反射式写入。
    pub fn install_system_module(&self, descriptor: ModuleDescriptor) -> Result<Arc<Module>> {
        if descriptor.kind != ModuleKind::System {
            return Err(CoreError::InvalidDescriptor(
                "系统模块描述符的种类必须是 System".to_string(),
            ));
        }
        let module = self.add_module(Arc::new(descriptor))?;
        module.set_wiring(Arc::new(Default::default()));
        debug!(module_id = %module.id(), "系统模块已注册");
        Ok(module)
    }

    /// 添加模块
    ///
    /// 为描述符分配 id，并索引其全部能力。每个能力的索引开销为
    /// 均摊 O(1)。
    pub fn add_module(&self, descriptor: Arc<ModuleDescriptor>) -> Result<Arc<Module>> {
        let id = ModuleId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let module = Arc::new(Module::new(id, descriptor));

        let mut inner = self.inner.write().expect("解析器状态锁中毒");
        for capability in &module.descriptor().capabilities {
            inner
                .capability_index
                .entry((capability.namespace, capability.name.clone()))
                .or_default()
                .push(id);
        }
        inner
            .by_name
            .entry(module.symbolic_name().to_string())
            .or_default()
            .push(id);
        inner.modules.insert(id, Arc::clone(&module));

        debug!(
            module_id = %id,
            symbolic_name = module.symbolic_name(),
            version = %module.version(),
            "模块已加入解析器状态"
        );
        Ok(module)
    }

    /// 移除模块
    ///
    /// 默认拒绝移除仍被其他已解析模块连线引用的模块（解除依赖方连线
    /// 是生命周期协调器的职责，应在移除前完成）。`force` 仅供协调器的
    /// refresh 路径使用。
    pub fn remove_module(&self, id: ModuleId, force: bool) -> Result<()> {
        let mut inner = self.inner.write().expect("解析器状态锁中毒");

        let module = inner
            .modules
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::ModuleNotFound(format!("id {}", id)))?;

        let dependents = Self::wired_dependents(&inner, id);
        if !dependents.is_empty() {
            if !force {
                return Err(CoreError::WiredDependents {
                    module: module.symbolic_name().to_string(),
                    dependents,
                });
            }
            warn!(
                module_id = %id,
                ?dependents,
                "强制移除仍被连线引用的模块"
            );
        }

        for capability in &module.descriptor().capabilities {
            if let Some(ids) = inner
                .capability_index
                .get_mut(&(capability.namespace, capability.name.clone()))
            {
                ids.retain(|m| *m != id);
            }
        }
        if let Some(ids) = inner.by_name.get_mut(module.symbolic_name()) {
            ids.retain(|m| *m != id);
        }
        inner.modules.remove(&id);

        debug!(module_id = %id, "模块已从解析器状态移除");
        Ok(())
    }

    /// 查询需求的候选能力（未按闭包排序）
    ///
    /// 返回所有命名空间/版本/过滤器均可接受的候选；
    /// 闭包相关的偏好排序由解析算法通过 [`matcher::match_requirement`] 完成。
    pub fn candidates(&self, requirement: &Requirement) -> Vec<Candidate> {
        let inner = self.inner.read().expect("解析器状态锁中毒");
        let Some(ids) = inner
            .capability_index
            .get(&(requirement.namespace, requirement.name.clone()))
        else {
            return vec![];
        };

        let mut raw = Vec::new();
        for id in ids {
            let Some(module) = inner.modules.get(id) else { continue };
            for capability in &module.descriptor().capabilities {
                if capability.namespace == requirement.namespace
                    && capability.name == requirement.name
                {
                    raw.push(Candidate::new(Arc::clone(module), capability.clone()));
                }
            }
        }
        matcher::match_requirement(requirement, raw, &HashSet::new())
    }

    /// 为 Fragment 查找宿主模块
    ///
    /// 将 Fragment 的宿主需求与非 Fragment 模块的宿主能力匹配，
    /// 跳过禁止附着的宿主，按匹配器顺序返回首选宿主。
    pub fn find_host(&self, fragment: &Module) -> Option<Arc<Module>> {
        let host_requirement = fragment.descriptor().host_requirement.as_ref()?;
        self.candidates(host_requirement)
            .into_iter()
            .filter(|c| !c.module.is_fragment())
            .find(|c| c.module.descriptor().fragment_attach == FragmentAttachPolicy::Always)
            .map(|c| c.module)
    }

    /// 按 id 获取模块
    pub fn get(&self, id: ModuleId) -> Option<Arc<Module>> {
        let inner = self.inner.read().expect("解析器状态锁中毒");
        inner.modules.get(&id).cloned()
    }

    /// 所有模块（按安装顺序）
    pub fn modules(&self) -> Vec<Arc<Module>> {
        let inner = self.inner.read().expect("解析器状态锁中毒");
        inner.modules.values().cloned().collect()
    }

    /// 按符号名查找模块
    pub fn find_by_name(&self, symbolic_name: &str) -> Vec<Arc<Module>> {
        let inner = self.inner.read().expect("解析器状态锁中毒");
        inner
            .by_name
            .get(symbolic_name)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.modules.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 查找同符号名的已解析单例模块（排除指定模块自身）
    pub fn resolved_singleton(&self, symbolic_name: &str, excluding: ModuleId) -> Option<Arc<Module>> {
        self.find_by_name(symbolic_name)
            .into_iter()
            .find(|m| m.id() != excluding && m.descriptor().singleton && m.is_resolved())
    }

    /// 仍连线引用指定模块的其他已解析模块的符号名
    fn wired_dependents(inner: &StateInner, id: ModuleId) -> Vec<String> {
        inner
            .modules
            .values()
            .filter(|m| m.id() != id)
            .filter(|m| {
                m.wiring()
                    .map(|w| w.wires.iter().any(|wire| wire.exporter == id))
                    .unwrap_or(false)
            })
            .map(|m| m.symbolic_name().to_string())
            .collect()
    }

    /// 仍连线引用指定模块的其他已解析模块的符号名（公开查询）
    pub fn dependents_of(&self, id: ModuleId) -> Vec<String> {
        let inner = self.inner.read().expect("解析器状态锁中毒");
        Self::wired_dependents(&inner, id)
    }

    /// 模块数量
    pub fn count(&self) -> usize {
        let inner = self.inner.read().expect("解析器状态锁中毒");
        inner.modules.len()
    }
}

impl Default for ResolverState {
    fn default() -> Self {
        Self::new()
    }
}
