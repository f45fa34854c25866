//! 调度核心
//!
//! - [`router`]：路由闸门，决定消息队列还是同步回退
//! - [`registry`]：合约键到执行策略的只读查找表
//! - [`execution_service`]：查找策略并执行

pub mod execution_service;
pub mod registry;
pub mod router;

pub use execution_service::{ExecutionService, JobExecutionService};
pub use registry::StrategyRegistry;
pub use router::{JobRouter, RouteDecision};
