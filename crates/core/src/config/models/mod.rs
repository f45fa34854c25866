pub mod app_config;
pub mod message_queue;
pub mod observability;
pub mod routing;
pub mod worker_strategy;

pub use app_config::AppConfig;
pub use message_queue::{MessageQueueConfig, MessageQueueType};
pub use observability::ObservabilityConfig;
pub use routing::{RoutingConfig, ToggleSource};
pub use worker_strategy::{StrategyConfig, StrategyKind, WorkerConfig};
