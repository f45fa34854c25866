//! # Orchestrator
//!
//! 任务编排核心：按合约键把任务路由到消息代理或回退到同步执行，
//! 并在 worker 侧消费任务消息、驱动遗留任务的生命周期。
//!
//! - `orchestrator-core`: 错误、模型、协作接口、配置与日志
//! - `orchestrator-dispatcher`: 路由闸门、策略注册表、执行服务
//! - `orchestrator-worker`: 生命周期策略、消息消费者、内置任务族
//! - `orchestrator-infrastructure`: 消息传输、功能开关、任务日志、重试发布

pub mod app;
pub mod shutdown;

pub use app::{Application, DispatchOutcome};
pub use shutdown::{wait_for_shutdown_signal, ShutdownManager};
