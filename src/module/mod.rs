//! 模块子系统
//!
//! 数据模型（描述符/能力/需求/连线）、属性过滤器、
//! 能力匹配器、解析器状态与解析算法、描述符文件解析。

pub mod descriptor;
pub mod filter;
pub mod matcher;
pub mod parser;
pub mod resolver;
pub mod state;

pub use descriptor::{
    Capability, DynamicPattern, FragmentAttachPolicy, Module, ModuleDescriptor, ModuleId,
    ModuleKind, Namespace, Requirement, Resolution, VersionRange, Wire, Wiring,
};
pub use filter::Filter;
pub use matcher::Candidate;
pub use resolver::{ResolveError, Resolver};
pub use state::ResolverState;
