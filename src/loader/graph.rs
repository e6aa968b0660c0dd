//! 模块加载器图
//!
//! 按连线图在模块间路由类加载请求。单次加载的查找链：
//!
//! 1. 本节点已定义的类；
//! 2. 引导委派（包名命中引导委派模式时交给基础加载器）;
//! 3. 静态导入连线（未命中时降级回本地内容）;
//! 4. 本地内容（宿主优先于 Fragment）;
//! 5. 动态导入（按需建立连线，必要时触发解析）。
//!
//! 加载全程同步；跨节点委派携带调用级上下文防止动态导入递归。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use tracing::{debug, trace, warn};

use crate::loader::content::{class_to_path, package_of, ContentSource};
use crate::loader::node::{ClassRef, LoadedClass, LoaderNode};
use crate::module::descriptor::{DynamicPattern, ModuleId};
use crate::module::resolver::Resolver;
use crate::module::state::ResolverState;
use crate::utils::{CoreError, Result};

/// 基础加载器：承接引导委派的类与资源
pub trait BaseLoader: Send + Sync + fmt::Debug {
    /// 加载引导类，不存在返回 None
    fn load_class(&self, class_name: &str) -> Option<ClassRef>;

    /// 加载引导资源
    fn load_resource(&self, path: &str) -> Option<Vec<u8>>;
}

/// 内容源支撑的基础加载器
///
/// 引导类定义在系统模块（id 0）名下，与模块类同样保持引用身份。
#[derive(Debug)]
pub struct BootLoader {
    content: Arc<dyn ContentSource>,
    defined: RwLock<HashMap<String, ClassRef>>,
}

impl BootLoader {
    /// 创建基础加载器
    pub fn new(content: Arc<dyn ContentSource>) -> Self {
        Self {
            content,
            defined: RwLock::new(HashMap::new()),
        }
    }
}

impl BaseLoader for BootLoader {
    fn load_class(&self, class_name: &str) -> Option<ClassRef> {
        if let Some(existing) = self.defined.read().expect("引导类表锁中毒").get(class_name) {
            return Some(Arc::clone(existing));
        }
        let bytes = self.content.entry(&class_to_path(class_name))?;
        let mut defined = self.defined.write().expect("引导类表锁中毒");
        let class = defined.entry(class_name.to_string()).or_insert_with(|| {
            Arc::new(LoadedClass {
                name: class_name.to_string(),
                bytes,
                defined_by: ModuleId(0),
            })
        });
        Some(Arc::clone(class))
    }

    fn load_resource(&self, path: &str) -> Option<Vec<u8>> {
        self.content.entry(path)
    }
}

/// 单次加载调用的上下文
///
/// 同一调用中重复进入相同的 (模块, 类名) 视为递归，直接判未找到。
#[derive(Debug, Default)]
struct LoadContext {
    visited: HashSet<(ModuleId, String)>,
}

impl LoadContext {
    fn enter(&mut self, id: ModuleId, class_name: &str) -> bool {
        self.visited.insert((id, class_name.to_string()))
    }
}

/// 模块加载器图
#[derive(Debug)]
pub struct LoaderGraph {
    state: Arc<ResolverState>,
    resolver: Arc<Resolver>,
    base: Arc<dyn BaseLoader>,
    /// 引导委派的包名模式
    boot_delegation: Vec<DynamicPattern>,
    /// 各模块的内容源（含 Fragment，安装时登记）
    contents: RwLock<HashMap<ModuleId, Arc<dyn ContentSource>>>,
    /// 已建成的加载器节点（仅宿主模块）
    nodes: RwLock<HashMap<ModuleId, Arc<LoaderNode>>>,
}

impl LoaderGraph {
    /// 创建加载器图
    pub fn new(
        state: Arc<ResolverState>,
        resolver: Arc<Resolver>,
        base: Arc<dyn BaseLoader>,
        boot_delegation: &[String],
    ) -> Self {
        Self {
            state,
            resolver,
            base,
            boot_delegation: boot_delegation
                .iter()
                .map(|p| DynamicPattern::parse(p))
                .collect(),
            contents: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// 登记模块内容源（安装时调用，Fragment 也登记）
    pub fn register_content(&self, id: ModuleId, content: Arc<dyn ContentSource>) {
        self.contents
            .write()
            .expect("内容源表锁中毒")
            .insert(id, content);
    }

    /// 丢弃模块的节点与内容源（卸载/刷新时调用）
    pub fn drop_module(&self, id: ModuleId) {
        self.nodes.write().expect("节点表锁中毒").remove(&id);
        self.contents.write().expect("内容源表锁中毒").remove(&id);
    }

    /// 丢弃节点但保留内容源（刷新后按新连线重建节点）
    pub fn drop_node(&self, id: ModuleId) {
        self.nodes.write().expect("节点表锁中毒").remove(&id);
    }

    /// 加载类的入口
    ///
    /// 模块必须已解析；Fragment 的请求路由到其宿主节点。
    pub fn load_class(&self, id: ModuleId, class_name: &str) -> Result<ClassRef> {
        let mut ctx = LoadContext::default();
        let node = self.node_for(id)?;
        match self.load_in_node(&node, class_name, &mut ctx) {
            Some(class) => Ok(class),
            None => Err(CoreError::ClassNotFound {
                class: class_name.to_string(),
                module: node.module().symbolic_name().to_string(),
            }),
        }
    }

    /// 加载资源：本地内容优先，其次基础加载器
    pub fn get_resource(&self, id: ModuleId, path: &str) -> Result<Vec<u8>> {
        let node = self.node_for(id)?;
        node.local_resource(path)
            .or_else(|| self.base.load_resource(path))
            .ok_or_else(|| CoreError::ResourceNotFound {
                path: path.to_string(),
                module: node.module().symbolic_name().to_string(),
            })
    }

    // ==================== 查找链 ====================

    fn load_in_node(
        &self,
        node: &Arc<LoaderNode>,
        class_name: &str,
        ctx: &mut LoadContext,
    ) -> Option<ClassRef> {
        // 递归保护：同一调用内重复进入视为未找到
        if !ctx.enter(node.id(), class_name) {
            trace!(module_id = %node.id(), class = class_name, "检测到加载递归，终止分支");
            return None;
        }

        // 1. 已定义的类
        if let Some(class) = node.defined_class(class_name) {
            return Some(class);
        }

        let package = package_of(class_name);

        // 2. 引导委派
        if !package.is_empty() && self.boot_delegation.iter().any(|p| p.matches(package)) {
            trace!(class = class_name, "包命中引导委派");
            if let Some(class) = self.base.load_class(class_name) {
                return Some(class);
            }
            // 引导未命中继续走模块链
        }

        // 3. 静态导入连线
        if !package.is_empty() {
            if let Some(exporter) = node.wiring().and_then(|w| w.package_exporter(package)) {
                if let Ok(exporter_node) = self.node_for(exporter) {
                    if let Some(class) = self.load_in_node(&exporter_node, class_name, ctx) {
                        return Some(class);
                    }
                }
                // 导出方未提供该类：降级回本地内容
                debug!(
                    module_id = %node.id(),
                    class = class_name,
                    exporter = %exporter,
                    "静态导入未命中，降级回本地内容"
                );
            }
        }

        // 4. 本地内容
        if let Some(class) = node.local_class(class_name) {
            return Some(class);
        }

        // 5. 动态导入
        if !package.is_empty() {
            return self.load_dynamic(node, package, class_name, ctx);
        }
        None
    }

    /// 动态导入：已有连线直用，否则按模式探测并建立连线
    fn load_dynamic(
        &self,
        node: &Arc<LoaderNode>,
        package: &str,
        class_name: &str,
        ctx: &mut LoadContext,
    ) -> Option<ClassRef> {
        // 已建立的动态连线；导出方已被移除时丢弃连线，回到正常探测
        if let Some(exporter) = node.dynamic_wire(package) {
            match self.node_for(exporter) {
                Ok(exporter_node) => return self.load_in_node(&exporter_node, class_name, ctx),
                Err(_) => {
                    debug!(
                        module_id = %node.id(),
                        package,
                        exporter = %exporter,
                        "动态连线的导出方已不可用，丢弃连线重新探测"
                    );
                    node.clear_dynamic_wire(package);
                }
            }
        }

        let patterns = &node.module().descriptor().dynamic_requirements;
        if !patterns.iter().any(|p| p.matches(package)) {
            return None;
        }

        let requirement = crate::module::descriptor::Requirement::import_package(package, "")
            .ok()?;
        let candidates = self.state.candidates(&requirement);

        // 已解析的导出方优先，其次按需解析
        let ordered = candidates
            .iter()
            .filter(|c| c.module.is_resolved())
            .chain(candidates.iter().filter(|c| !c.module.is_resolved()));

        for candidate in ordered {
            let exporter_id = candidate.module.id();
            if exporter_id == node.id() {
                continue;
            }
            if !candidate.module.is_resolved() {
                if let Err(e) = self.resolver.resolve(exporter_id) {
                    debug!(
                        exporter = %exporter_id,
                        error = %e,
                        "动态导入候选解析失败，尝试下一个"
                    );
                    continue;
                }
            }
            let Ok(exporter_node) = self.node_for(exporter_id) else { continue };
            if let Some(class) = self.load_in_node(&exporter_node, class_name, ctx) {
                node.record_dynamic_wire(package, exporter_node.id());
                return Some(class);
            }
        }
        None
    }

    // ==================== 节点管理 ====================

    /// 取模块的加载器节点，必要时惰性建成
    ///
    /// Fragment 没有自己的节点，路由到宿主。
    pub fn node_for(&self, id: ModuleId) -> Result<Arc<LoaderNode>> {
        if let Some(node) = self.nodes.read().expect("节点表锁中毒").get(&id) {
            return Ok(Arc::clone(node));
        }

        let module = self
            .state
            .get(id)
            .ok_or_else(|| CoreError::ModuleNotFound(format!("id {}", id)))?;
        let wiring = module
            .wiring()
            .ok_or_else(|| CoreError::NotResolved(module.symbolic_name().to_string()))?;

        if module.is_fragment() {
            let host = wiring.host.ok_or_else(|| {
                CoreError::Internal(format!(
                    "Fragment '{}' 的连线缺少宿主",
                    module.symbolic_name()
                ))
            })?;
            return self.node_for(host);
        }

        let content = self.content_of(id)?;
        let mut node = LoaderNode::new(Arc::clone(&module), content);
        for fragment_id in &wiring.fragments {
            match self.content_of(*fragment_id) {
                Ok(content) => node.attach_fragment(*fragment_id, content),
                Err(_) => warn!(
                    host = %id,
                    fragment = %fragment_id,
                    "Fragment 内容源未登记，跳过附着"
                ),
            }
        }

        let node = Arc::new(node);
        let mut nodes = self.nodes.write().expect("节点表锁中毒");
        // 并发建成时保留先写入的节点
        Ok(Arc::clone(nodes.entry(id).or_insert(node)))
    }

    fn content_of(&self, id: ModuleId) -> Result<Arc<dyn ContentSource>> {
        self.contents
            .read()
            .expect("内容源表锁中毒")
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::Internal(format!("模块 id {} 的内容源未登记", id)))
    }
}
