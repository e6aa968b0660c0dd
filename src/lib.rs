//! # OxGi Core
//!
//! OSGi 风格的模块框架内核：依赖解析器与模块类加载图。
//!
//! ## 核心功能
//!
//! - **模块描述符**：不可变的能力/需求列表，版本区间与属性过滤器
//! - **解析算法**：传递闭包、循环容忍、全有或全无提交、候选回溯、
//!   单例/执行环境/uses 约束校验、Fragment 附着
//! - **加载器图**：引导委派、静态导入连线、本地内容（宿主优先于
//!   Fragment）、动态导入按需解析，全程同步
//! - **生命周期协调器**：安装/解析/启动/停止/更新/卸载/刷新，
//!   广播框架事件
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use oxgi_core::core::config::FrameworkConfig;
//! use oxgi_core::framework::BundleCoordinator;
//! use oxgi_core::loader::MemoryContent;
//! use oxgi_core::module::ModuleDescriptor;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> oxgi_core::Result<()> {
//!     let coordinator = BundleCoordinator::new(FrameworkConfig::default())?;
//!     let bundle = coordinator
//!         .install(
//!             ModuleDescriptor::bundle("com.acme.app", "1.0")?,
//!             Arc::new(MemoryContent::new()),
//!             None,
//!         )
//!         .await?;
//!     coordinator.start(bundle.id()).await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod framework;
pub mod loader;
pub mod module;
pub mod utils;

pub use crate::core::config::FrameworkConfig;
pub use crate::framework::{Bundle, BundleActivator, BundleCoordinator, BundleState};
pub use crate::loader::{ContentSource, LoaderGraph};
pub use crate::module::{ModuleDescriptor, ModuleId, ResolveError, Resolver, ResolverState};
pub use crate::utils::{CoreError, Result};

/// 框架版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 框架名称
pub const NAME: &str = "OxGi Core";
