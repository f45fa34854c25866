use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use orchestrator_core::{
    config::models::{MessageQueueConfig, MessageQueueType},
    MessageQueue, OrchestratorError, OrchestratorResult,
};

use crate::{InMemoryMessageQueue, RabbitMqMessageQueue, UnsupportedMessageQueue};

pub struct MessageQueueFactory;

impl MessageQueueFactory {
    pub async fn create(config: &MessageQueueConfig) -> OrchestratorResult<Arc<dyn MessageQueue>> {
        debug!("Creating message queue with type: {:?}", config.r#type);
        Self::validate_config(config)?;

        match config.r#type {
            MessageQueueType::Rabbitmq => {
                info!("Initializing RabbitMQ message queue");
                let timeout = Duration::from_secs(config.connection_timeout_seconds);
                let rabbitmq = tokio::time::timeout(timeout, RabbitMqMessageQueue::new(config.clone()))
                    .await
                    .map_err(|_| {
                        OrchestratorError::MessageQueue(format!(
                            "连接RabbitMQ超时 ({}秒)",
                            config.connection_timeout_seconds
                        ))
                    })??;
                Ok(Arc::new(rabbitmq))
            }
            MessageQueueType::InMemory => {
                info!("Initializing in-memory message queue");
                Ok(Arc::new(InMemoryMessageQueue::new()))
            }
            MessageQueueType::Disabled => {
                info!("Message transport disabled, routing will fall back to synchronous execution");
                Ok(Arc::new(UnsupportedMessageQueue::new()))
            }
        }
    }

    pub fn validate_config(config: &MessageQueueConfig) -> OrchestratorResult<()> {
        config
            .validate()
            .map_err(|e| OrchestratorError::Configuration(e.to_string()))
    }
}
