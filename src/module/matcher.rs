//! 能力/需求匹配器
//!
//! 对候选能力集合做命名空间感知的需求匹配：命名空间精确相等、
//! 版本落入区间、属性过滤器求值为真。
//!
//! 可接受的候选按确定性顺序返回（平局裁决规则见 [`match_requirement`]）。

use std::collections::HashSet;
use std::sync::Arc;

use crate::module::descriptor::{Capability, Module, ModuleId, Requirement};

/// 一个候选：提供能力的模块与能力本身
#[derive(Debug, Clone)]
pub struct Candidate {
    /// 提供方模块
    pub module: Arc<Module>,
    /// 被匹配的能力
    pub capability: Capability,
}

impl Candidate {
    /// 构造候选
    pub fn new(module: Arc<Module>, capability: Capability) -> Self {
        Self { module, capability }
    }
}

/// 检查单个能力是否满足需求
pub fn satisfies(requirement: &Requirement, capability: &Capability) -> bool {
    if requirement.namespace != capability.namespace {
        return false;
    }
    if requirement.name != capability.name {
        return false;
    }
    if !requirement.range.includes(&capability.version) {
        return false;
    }
    if let Some(ref filter) = requirement.filter {
        if !filter.matches(&capability.filter_attributes()) {
            return false;
        }
    }
    true
}

/// 匹配需求，返回按偏好排序的可接受候选列表
///
/// 平局裁决顺序（确定性）：
/// 1. 已在当前解析闭包中的提供方优先；
/// 2. 能力版本高者优先；
/// 3. 模块 id 小者（安装更早）优先。
///
/// 对可选需求，空结果不是错误，调用方直接省略连线。
pub fn match_requirement(
    requirement: &Requirement,
    candidates: Vec<Candidate>,
    closure: &HashSet<ModuleId>,
) -> Vec<Candidate> {
    let mut acceptable: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| satisfies(requirement, &c.capability))
        .collect();

    acceptable.sort_by(|a, b| {
        let a_in = closure.contains(&a.module.id());
        let b_in = closure.contains(&b.module.id());
        b_in.cmp(&a_in)
            .then_with(|| b.capability.version.cmp(&a.capability.version))
            .then_with(|| a.module.id().cmp(&b.module.id()))
    });

    acceptable
}
