//! 框架层
//!
//! Bundle 生命周期协调器与框架事件。

pub mod events;
pub mod lifecycle;

pub use events::{EventBus, FrameworkEvent};
pub use lifecycle::{
    ActivatorContext, Bundle, BundleActivator, BundleCoordinator, BundleState,
};
