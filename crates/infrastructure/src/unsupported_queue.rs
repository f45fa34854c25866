use async_trait::async_trait;
use orchestrator_core::{Message, MessageQueue, OrchestratorError, OrchestratorResult};

/// 未接入消息传输的环境使用的队列
///
/// 所有操作都返回 [`OrchestratorError::NotSupported`]，路由层据此回退到同步执行。
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedMessageQueue;

impl UnsupportedMessageQueue {
    pub fn new() -> Self {
        Self
    }

    fn unsupported<T>(operation: &str) -> OrchestratorResult<T> {
        Err(OrchestratorError::NotSupported(format!(
            "当前环境未接入消息传输: {operation}"
        )))
    }
}

#[async_trait]
impl MessageQueue for UnsupportedMessageQueue {
    async fn publish_message(&self, _queue: &str, _message: &Message) -> OrchestratorResult<()> {
        Self::unsupported("publish_message")
    }

    async fn consume_messages(&self, _queue: &str) -> OrchestratorResult<Vec<Message>> {
        Self::unsupported("consume_messages")
    }

    async fn ack_message(&self, _message_id: &str) -> OrchestratorResult<()> {
        Self::unsupported("ack_message")
    }

    async fn nack_message(&self, _message_id: &str, _requeue: bool) -> OrchestratorResult<()> {
        Self::unsupported("nack_message")
    }
}
