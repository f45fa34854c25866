pub mod in_memory_queue;
pub mod job_log;
pub mod message_queue;
pub mod message_queue_factory;
pub mod retry;
pub mod toggle_store;
pub mod unsupported_queue;

pub use in_memory_queue::{InMemoryMessageQueue, InMemoryQueueConfig};
pub use job_log::TracingJobLog;
pub use message_queue::RabbitMqMessageQueue;
pub use message_queue_factory::MessageQueueFactory;
pub use retry::RetryPublisher;
pub use toggle_store::{toggle_store_from_config, FileToggleStore, StaticToggleStore};
pub use unsupported_queue::UnsupportedMessageQueue;
