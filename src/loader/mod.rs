//! 类加载子系统
//!
//! 内容源抽象、按模块的加载器节点、跨模块委派的加载器图。

pub mod content;
pub mod graph;
pub mod node;

pub use content::{ContentSource, DirContent, MemoryContent};
pub use graph::{BaseLoader, BootLoader, LoaderGraph};
pub use node::{ClassRef, LoadedClass, LoaderNode};
