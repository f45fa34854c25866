use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lapin::{
    options::*, types::FieldTable, types::ShortString, BasicProperties, Channel, Connection,
    ConnectionProperties, Queue,
};
use orchestrator_core::{
    config::models::MessageQueueConfig, Message, MessageQueue, OrchestratorError,
    OrchestratorResult,
};
use tracing::{debug, info};

/// RabbitMQ消息队列实现
///
/// `consume_messages` 以手动确认方式拉取消息，投递标签按消息ID记录，
/// 之后的 `ack_message`/`nack_message` 作用于真实的投递。
pub struct RabbitMqMessageQueue {
    connection: Connection,
    channel: Arc<tokio::sync::Mutex<Channel>>,
    deliveries: Mutex<HashMap<String, u64>>,
    config: MessageQueueConfig,
}

impl RabbitMqMessageQueue {
    /// 创建新的RabbitMQ消息队列实例
    pub async fn new(config: MessageQueueConfig) -> OrchestratorResult<Self> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(|e| OrchestratorError::MessageQueue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| OrchestratorError::MessageQueue(format!("创建通道失败: {e}")))?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| OrchestratorError::MessageQueue(format!("开启发布确认失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        let queue = Self {
            connection,
            channel: Arc::new(tokio::sync::Mutex::new(channel)),
            deliveries: Mutex::new(HashMap::new()),
            config,
        };

        queue.initialize_queues().await?;

        Ok(queue)
    }

    /// 声明任务队列
    async fn initialize_queues(&self) -> OrchestratorResult<()> {
        let channel = self.channel.lock().await;
        Self::declare_queue(&channel, &self.config.job_queue, true).await?;

        info!("任务队列 {} 初始化完成", self.config.job_queue);
        Ok(())
    }

    async fn declare_queue(
        channel: &Channel,
        queue_name: &str,
        durable: bool,
    ) -> OrchestratorResult<Queue> {
        let queue = channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                OrchestratorError::MessageQueue(format!("声明队列 {queue_name} 失败: {e}"))
            })?;

        debug!("队列 {} 声明成功", queue_name);
        Ok(queue)
    }

    fn properties_for(message: &Message) -> BasicProperties {
        let mut properties = BasicProperties::default()
            .with_delivery_mode(2) // 2 = persistent
            .with_content_type(ShortString::from("application/json".to_string()))
            .with_message_id(ShortString::from(message.id.clone()))
            .with_timestamp(message.timestamp.timestamp().max(0) as u64);

        if let Some(correlation_id) = &message.correlation_id {
            properties = properties.with_correlation_id(ShortString::from(correlation_id.clone()));
        }

        properties
    }

    fn is_not_found(error: &lapin::Error) -> bool {
        let error_msg = error.to_string();
        error_msg.contains("NOT_FOUND") || error_msg.contains("404")
    }

    fn take_delivery_tag(&self, message_id: &str) -> OrchestratorResult<u64> {
        let mut deliveries = self
            .deliveries
            .lock()
            .map_err(|_| OrchestratorError::Internal("投递标签表锁已中毒".to_string()))?;

        deliveries.remove(message_id).ok_or_else(|| {
            OrchestratorError::MessageQueue(format!("未找到消息 {message_id} 的投递记录"))
        })
    }
}

#[async_trait]
impl MessageQueue for RabbitMqMessageQueue {
    async fn publish_message(&self, queue: &str, message: &Message) -> OrchestratorResult<()> {
        let channel = self.channel.lock().await;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &message.body,
                Self::properties_for(message),
            )
            .await
            .map_err(|e| {
                OrchestratorError::MessageQueue(format!("发布消息到队列 {queue} 失败: {e}"))
            })?;

        let confirmation = confirm
            .await
            .map_err(|e| OrchestratorError::MessageQueue(format!("消息发布确认失败: {e}")))?;

        if confirmation.is_nack() {
            return Err(OrchestratorError::MessageQueue(format!(
                "消息 {} 被代理拒绝",
                message.id
            )));
        }

        debug!(message_id = %message.id, "消息已发布到队列: {}", queue);
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> OrchestratorResult<Vec<Message>> {
        let channel = self.channel.lock().await;

        let get_result = channel
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await;

        match get_result {
            Ok(Some(get_message)) => {
                let delivery = get_message.delivery;
                let message_id = delivery
                    .properties
                    .message_id()
                    .as_ref()
                    .map(|id| id.as_str().to_string())
                    .unwrap_or_else(|| format!("delivery-{}", delivery.delivery_tag));

                let timestamp = (*delivery.properties.timestamp())
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts as i64, 0))
                    .unwrap_or_else(Utc::now);

                let correlation_id = delivery
                    .properties
                    .correlation_id()
                    .as_ref()
                    .map(|id| id.as_str().to_string());

                self.deliveries
                    .lock()
                    .map_err(|_| OrchestratorError::Internal("投递标签表锁已中毒".to_string()))?
                    .insert(message_id.clone(), delivery.delivery_tag);

                let message = Message {
                    id: message_id,
                    body: delivery.data,
                    timestamp,
                    redelivered: delivery.redelivered,
                    correlation_id,
                };

                Ok(vec![message])
            }
            Ok(None) => Ok(vec![]),
            Err(e) => {
                if Self::is_not_found(&e) {
                    debug!("队列 {} 不存在，返回空结果", queue);
                    Ok(vec![])
                } else {
                    Err(OrchestratorError::MessageQueue(format!(
                        "从队列 {queue} 获取消息失败: {e}"
                    )))
                }
            }
        }
    }

    async fn ack_message(&self, message_id: &str) -> OrchestratorResult<()> {
        let delivery_tag = self.take_delivery_tag(message_id)?;
        let channel = self.channel.lock().await;
        channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| OrchestratorError::MessageQueue(format!("确认消息失败: {e}")))?;

        debug!("确认消息: {}", message_id);
        Ok(())
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> OrchestratorResult<()> {
        let delivery_tag = self.take_delivery_tag(message_id)?;
        let channel = self.channel.lock().await;
        channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue,
                },
            )
            .await
            .map_err(|e| OrchestratorError::MessageQueue(format!("拒绝消息失败: {e}")))?;

        debug!("拒绝消息: {}, 重新入队: {}", message_id, requeue);
        Ok(())
    }

    async fn close(&self) -> OrchestratorResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| OrchestratorError::MessageQueue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}
