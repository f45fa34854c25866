use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use orchestrator_core::{Message, MessageQueue, OrchestratorError, OrchestratorResult};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// 内存消息队列实现
///
/// 使用 Tokio channels 实现的进程内消息队列，适用于单机部署与测试。
/// 消费出的消息在确认前记录为进行中，`nack_message(requeue=true)` 会把它重新放回队列。
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    /// 队列存储：队列名 -> 通道
    queues: RwLock<HashMap<String, Arc<QueueChannels>>>,
    /// 已消费但尚未确认的消息：消息ID -> (队列名, 消息)
    in_flight: Mutex<HashMap<String, (String, Message)>>,
    config: InMemoryQueueConfig,
}

#[derive(Debug)]
struct QueueChannels {
    sender: mpsc::UnboundedSender<Message>,
    receiver: Mutex<mpsc::UnboundedReceiver<Message>>,
    size: AtomicU32,
}

impl QueueChannels {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            size: AtomicU32::new(0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryQueueConfig {
    /// 单个队列最大容量（0表示无限制）
    pub max_queue_size: u32,
    /// 单次 `consume_messages` 最多返回的消息数
    pub batch_size: usize,
}

impl Default for InMemoryQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
            batch_size: 32,
        }
    }
}

impl InMemoryMessageQueue {
    /// 创建新的内存消息队列实例
    pub fn new() -> Self {
        Self::with_config(InMemoryQueueConfig::default())
    }

    /// 使用指定配置创建内存消息队列实例
    pub fn with_config(config: InMemoryQueueConfig) -> Self {
        info!("创建内存消息队列: {:?}", config);
        Self {
            queues: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            config,
        }
    }

    async fn get_or_create_queue(&self, queue_name: &str) -> Arc<QueueChannels> {
        if let Some(channels) = self.queues.read().await.get(queue_name) {
            return Arc::clone(channels);
        }

        let mut queues = self.queues.write().await;
        Arc::clone(
            queues
                .entry(queue_name.to_string())
                .or_insert_with(|| {
                    debug!("创建内存队列 '{}'", queue_name);
                    Arc::new(QueueChannels::new())
                }),
        )
    }

    fn enqueue(channels: &QueueChannels, queue: &str, message: Message) -> OrchestratorResult<()> {
        channels.sender.send(message).map_err(|e| {
            OrchestratorError::MessageQueue(format!("发送消息到队列 '{queue}' 失败: {e}"))
        })?;
        channels.size.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// 已消费但尚未确认的消息数量
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish_message(&self, queue: &str, message: &Message) -> OrchestratorResult<()> {
        let channels = self.get_or_create_queue(queue).await;

        let max = self.config.max_queue_size;
        if max > 0 && channels.size.load(Ordering::SeqCst) >= max {
            warn!("队列 '{}' 已满，拒绝消息 {}", queue, message.id);
            return Err(OrchestratorError::MessageQueue(format!(
                "队列 '{queue}' 已达到最大容量 {max}"
            )));
        }

        Self::enqueue(&channels, queue, message.clone())?;

        debug!(message_id = %message.id, "消息已发布到内存队列 '{}'", queue);
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> OrchestratorResult<Vec<Message>> {
        let channels = self.get_or_create_queue(queue).await;
        let mut messages = Vec::new();

        {
            let mut rx = channels.receiver.lock().await;
            while messages.len() < self.config.batch_size {
                match rx.try_recv() {
                    Ok(message) => messages.push(message),
                    Err(_) => break,
                }
            }
        }

        if !messages.is_empty() {
            channels
                .size
                .fetch_sub(messages.len() as u32, Ordering::SeqCst);

            let mut in_flight = self.in_flight.lock().await;
            for message in &messages {
                in_flight.insert(message.id.clone(), (queue.to_string(), message.clone()));
            }
            debug!("从内存队列 '{}' 消费 {} 条消息", queue, messages.len());
        }

        Ok(messages)
    }

    async fn ack_message(&self, message_id: &str) -> OrchestratorResult<()> {
        match self.in_flight.lock().await.remove(message_id) {
            Some(_) => {
                debug!("确认消息: {}", message_id);
                Ok(())
            }
            None => Err(OrchestratorError::MessageQueue(format!(
                "消息 {message_id} 不在进行中"
            ))),
        }
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> OrchestratorResult<()> {
        let (queue, message) = self
            .in_flight
            .lock()
            .await
            .remove(message_id)
            .ok_or_else(|| {
                OrchestratorError::MessageQueue(format!("消息 {message_id} 不在进行中"))
            })?;

        if requeue {
            let channels = self.get_or_create_queue(&queue).await;
            Self::enqueue(&channels, &queue, message.with_redelivered(true))?;
            debug!("消息 {} 已重新放回队列 '{}'", message_id, queue);
        } else {
            debug!("丢弃消息: {}", message_id);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> Message {
        Message::from_body(id, br#"{"contractKey":"X"}"#.to_vec())
    }

    #[tokio::test]
    async fn test_publish_and_consume() {
        let queue = InMemoryMessageQueue::new();
        queue.publish_message("jobs", &message("m-1")).await.unwrap();
        queue.publish_message("jobs", &message("m-2")).await.unwrap();

        let consumed = queue.consume_messages("jobs").await.unwrap();
        assert_eq!(
            consumed.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["m-1", "m-2"]
        );
        assert!(queue.consume_messages("jobs").await.unwrap().is_empty());
        assert_eq!(queue.in_flight_count().await, 2);
    }

    #[tokio::test]
    async fn test_ack_clears_in_flight() {
        let queue = InMemoryMessageQueue::new();
        queue.publish_message("jobs", &message("m-1")).await.unwrap();
        queue.consume_messages("jobs").await.unwrap();

        queue.ack_message("m-1").await.unwrap();
        assert_eq!(queue.in_flight_count().await, 0);
        assert!(queue.ack_message("m-1").await.is_err());
    }

    #[tokio::test]
    async fn test_nack_requeue_redelivers() {
        let queue = InMemoryMessageQueue::new();
        queue.publish_message("jobs", &message("m-1")).await.unwrap();
        queue.consume_messages("jobs").await.unwrap();

        queue.nack_message("m-1", true).await.unwrap();

        let redelivered = queue.consume_messages("jobs").await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert!(redelivered[0].redelivered);
    }

    #[tokio::test]
    async fn test_nack_without_requeue_drops() {
        let queue = InMemoryMessageQueue::new();
        queue.publish_message("jobs", &message("m-1")).await.unwrap();
        queue.consume_messages("jobs").await.unwrap();

        queue.nack_message("m-1", false).await.unwrap();

        assert!(queue.consume_messages("jobs").await.unwrap().is_empty());
        assert_eq!(queue.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn test_batch_size_limits_consume() {
        let queue = InMemoryMessageQueue::with_config(InMemoryQueueConfig {
            max_queue_size: 0,
            batch_size: 2,
        });
        for i in 0..5 {
            queue
                .publish_message("jobs", &message(&format!("m-{i}")))
                .await
                .unwrap();
        }

        assert_eq!(queue.consume_messages("jobs").await.unwrap().len(), 2);
        assert_eq!(queue.consume_messages("jobs").await.unwrap().len(), 2);
        assert_eq!(queue.consume_messages("jobs").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_consumed_messages_free_capacity() {
        let queue = InMemoryMessageQueue::with_config(InMemoryQueueConfig {
            max_queue_size: 1,
            batch_size: 32,
        });
        queue.publish_message("jobs", &message("m-1")).await.unwrap();
        queue.consume_messages("jobs").await.unwrap();

        queue.publish_message("jobs", &message("m-2")).await.unwrap();
        queue.publish_message("other", &message("m-3")).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_rejects_publish() {
        let queue = InMemoryMessageQueue::with_config(InMemoryQueueConfig {
            max_queue_size: 1,
            batch_size: 32,
        });
        queue.publish_message("jobs", &message("m-1")).await.unwrap();

        let result = queue.publish_message("jobs", &message("m-2")).await;
        assert!(matches!(result, Err(OrchestratorError::MessageQueue(_))));
    }
}
