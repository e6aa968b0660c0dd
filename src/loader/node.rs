//! 模块加载器节点
//!
//! 每个已解析的宿主模块持有一个加载器节点：本地内容（自身 + 附着
//! Fragment）、已定义类表、动态导入连线缓存。
//!
//! 不变式：同一节点对同一类名只定义一次；并发的首次定义竞争由
//! 定义表裁决，后到者得到先到者的定义（类身份唯一）。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::loader::content::{class_to_path, ContentSource};
use crate::module::descriptor::{Module, ModuleId, Wiring};

/// 已定义的类
#[derive(Debug)]
pub struct LoadedClass {
    /// 全限定类名
    pub name: String,
    /// 类字节
    pub bytes: Vec<u8>,
    /// 定义方模块
    pub defined_by: ModuleId,
}

/// 类引用：类身份 = 引用身份（`Arc::ptr_eq`）
pub type ClassRef = Arc<LoadedClass>;

/// 单个宿主模块的加载器节点
#[derive(Debug)]
pub struct LoaderNode {
    module: Arc<Module>,
    content: Arc<dyn ContentSource>,
    /// 附着 Fragment 的内容源（按附着顺序）
    fragment_contents: Vec<(ModuleId, Arc<dyn ContentSource>)>,
    /// 已定义类表（首次定义获胜）
    defined: RwLock<HashMap<String, ClassRef>>,
    /// 动态导入的已建立连线：包名 -> 导出方
    dynamic_wires: RwLock<HashMap<String, ModuleId>>,
}

impl LoaderNode {
    /// 创建节点
    pub fn new(module: Arc<Module>, content: Arc<dyn ContentSource>) -> Self {
        Self {
            module,
            content,
            fragment_contents: Vec::new(),
            defined: RwLock::new(HashMap::new()),
            dynamic_wires: RwLock::new(HashMap::new()),
        }
    }

    /// 附着 Fragment 内容（节点构建期调用，按附着顺序）
    pub fn attach_fragment(&mut self, id: ModuleId, content: Arc<dyn ContentSource>) {
        debug!(host = %self.module.id(), fragment = %id, "附着 Fragment 内容");
        self.fragment_contents.push((id, content));
    }

    /// 节点归属的模块
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// 模块 id
    pub fn id(&self) -> ModuleId {
        self.module.id()
    }

    /// 当前连线集合（节点只为已解析模块创建，理应始终存在）
    pub fn wiring(&self) -> Option<Arc<Wiring>> {
        self.module.wiring()
    }

    /// 从本地内容加载类：宿主内容优先，其次按附着顺序查 Fragment
    ///
    /// 命中即定义；重复调用返回同一 [`ClassRef`]。
    pub fn local_class(&self, class_name: &str) -> Option<ClassRef> {
        if let Some(existing) = self
            .defined
            .read()
            .expect("类定义表锁中毒")
            .get(class_name)
        {
            return Some(Arc::clone(existing));
        }

        let path = class_to_path(class_name);
        let bytes = self.content.entry(&path).or_else(|| {
            self.fragment_contents
                .iter()
                .find_map(|(_, content)| content.entry(&path))
        })?;
        Some(self.define_class(class_name, bytes))
    }

    /// 本地内容是否包含该类（不触发定义）
    pub fn has_local_class(&self, class_name: &str) -> bool {
        let path = class_to_path(class_name);
        self.content.contains(&path)
            || self
                .fragment_contents
                .iter()
                .any(|(_, content)| content.contains(&path))
    }

    /// 从本地内容读取资源：宿主内容优先，其次 Fragment
    pub fn local_resource(&self, path: &str) -> Option<Vec<u8>> {
        self.content.entry(path).or_else(|| {
            self.fragment_contents
                .iter()
                .find_map(|(_, content)| content.entry(path))
        })
    }

    /// 定义类，首次定义获胜
    pub fn define_class(&self, class_name: &str, bytes: Vec<u8>) -> ClassRef {
        let mut defined = self.defined.write().expect("类定义表锁中毒");
        let class = defined.entry(class_name.to_string()).or_insert_with(|| {
            trace!(module_id = %self.module.id(), class = class_name, "定义类");
            Arc::new(LoadedClass {
                name: class_name.to_string(),
                bytes,
                defined_by: self.module.id(),
            })
        });
        Arc::clone(class)
    }

    /// 查询已定义的类（不触发内容读取）
    pub fn defined_class(&self, class_name: &str) -> Option<ClassRef> {
        self.defined
            .read()
            .expect("类定义表锁中毒")
            .get(class_name)
            .cloned()
    }

    /// 查询已建立的动态导入连线
    pub fn dynamic_wire(&self, package: &str) -> Option<ModuleId> {
        self.dynamic_wires
            .read()
            .expect("动态连线表锁中毒")
            .get(package)
            .copied()
    }

    /// 清除动态导入连线（导出方离开解析器状态后调用）
    pub fn clear_dynamic_wire(&self, package: &str) {
        self.dynamic_wires
            .write()
            .expect("动态连线表锁中毒")
            .remove(package);
    }

    /// 记录动态导入连线（后续同包加载直接走该导出方）
    pub fn record_dynamic_wire(&self, package: &str, exporter: ModuleId) {
        debug!(
            module_id = %self.module.id(),
            package,
            exporter = %exporter,
            "建立动态导入连线"
        );
        self.dynamic_wires
            .write()
            .expect("动态连线表锁中毒")
            .insert(package.to_string(), exporter);
    }
}
