use async_trait::async_trait;

use crate::{models::Message, OrchestratorResult};

/// 消息队列抽象接口
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布消息到指定队列
    async fn publish_message(&self, queue: &str, message: &Message) -> OrchestratorResult<()>;

    /// 从指定队列消费消息，消息在确认前保持未确认状态
    async fn consume_messages(&self, queue: &str) -> OrchestratorResult<Vec<Message>>;

    /// 确认消息处理完成
    async fn ack_message(&self, message_id: &str) -> OrchestratorResult<()>;

    /// 拒绝消息，可选择重新入队
    async fn nack_message(&self, message_id: &str, requeue: bool) -> OrchestratorResult<()>;

    /// 释放底层连接，默认无需处理
    async fn close(&self) -> OrchestratorResult<()> {
        Ok(())
    }
}
