//! # Orchestrator Testing Utils
//!
//! 工作区共享的测试工具，作为 dev-dependency 使用：
//!
//! - **Mocks**: 可记录调用、可注入失败的遗留任务、任务日志、功能开关与消息队列
//! - **Builders**: 带默认值的任务描述符构建器
//! - **Helpers**: 按级别统计 `tracing` 事件的日志捕获层
//!
//! ```toml
//! [dev-dependencies]
//! orchestrator-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
