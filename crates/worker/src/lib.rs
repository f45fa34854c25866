pub mod consumer;
pub mod jobs;
pub mod lifecycle;
pub mod strategy;
pub mod strategy_factory;

pub use consumer::{ConsumeOutcome, JobConsumer};
pub use jobs::{HttpJob, HttpJobFactory, ShellJob, ShellJobFactory};
pub use lifecycle::{JobLifecycle, LifecyclePhase};
pub use strategy::LifecycleStrategy;
pub use strategy_factory::StrategyFactory;
