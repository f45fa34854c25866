use std::any::Any;
use std::error::Error as _;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use orchestrator_core::{
    config::models::WorkerConfig, CancellationToken, Message, MessageQueue, OrchestratorError,
};
use orchestrator_dispatcher::JobExecutionService;

/// 单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Completed,
    Failed,
    Cancelled,
    Malformed,
    Panicked,
}

/// 任务消息消费者
///
/// 解码消息并交给执行服务。执行过程中的任何错误或 panic 都在这里转换为一条错误日志，
/// 之后消息总会被确认，`consume` 本身从不返回错误。
pub struct JobConsumer {
    message_queue: Arc<dyn MessageQueue>,
    execution: Arc<dyn JobExecutionService>,
    job_queue: String,
    max_concurrent_jobs: usize,
    poll_interval: Duration,
    shutdown_timeout: Duration,
}

impl JobConsumer {
    pub fn new(
        message_queue: Arc<dyn MessageQueue>,
        execution: Arc<dyn JobExecutionService>,
        job_queue: impl Into<String>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            message_queue,
            execution,
            job_queue: job_queue.into(),
            max_concurrent_jobs: config.max_concurrent_jobs.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_seconds),
        }
    }

    /// 处理一条任务消息并确认
    pub async fn consume(&self, message: Message, cancel: &CancellationToken) -> ConsumeOutcome {
        debug!(
            message_id = %message.id,
            redelivered = message.redelivered,
            "收到任务消息"
        );

        let outcome = self.handle(&message, cancel).await;

        if let Err(e) = self.message_queue.ack_message(&message.id).await {
            warn!(message_id = %message.id, "确认消息失败: {}", e);
        }

        outcome
    }

    async fn handle(&self, message: &Message, cancel: &CancellationToken) -> ConsumeOutcome {
        let descriptor = match message.decode_job() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!(
                    message_id = %message.id,
                    "无法解析的任务消息: {}; 错误链: {}",
                    e,
                    error_chain(&e)
                );
                return ConsumeOutcome::Malformed;
            }
        };

        let job_id = descriptor.job_id();
        let contract_key = descriptor.contract_key().to_string();

        let execution = AssertUnwindSafe(self.execution.execute_job(descriptor, cancel))
            .catch_unwind()
            .await;

        match execution {
            Ok(Ok(())) => {
                debug!(message_id = %message.id, job_id = %job_id, "任务消息处理完成");
                ConsumeOutcome::Completed
            }
            Ok(Err(e)) if e.is_cancelled() => {
                error!(
                    message_id = %message.id,
                    job_id = %job_id,
                    contract_key = %contract_key,
                    "任务执行被取消: {}",
                    e
                );
                ConsumeOutcome::Cancelled
            }
            Ok(Err(e)) => {
                error!(
                    message_id = %message.id,
                    job_id = %job_id,
                    contract_key = %contract_key,
                    "任务执行失败: {}; 错误链: {}",
                    e,
                    error_chain(&e)
                );
                ConsumeOutcome::Failed
            }
            Err(panic) => {
                error!(
                    message_id = %message.id,
                    job_id = %job_id,
                    contract_key = %contract_key,
                    "任务执行发生panic: {}",
                    panic_message(panic.as_ref())
                );
                ConsumeOutcome::Panicked
            }
        }
    }

    /// 把已拉取但尚未开始处理的消息放回队列
    async fn requeue(&self, messages: impl Iterator<Item = Message>) {
        for message in messages {
            match self.message_queue.nack_message(&message.id, true).await {
                Ok(()) => debug!(message_id = %message.id, "消息未开始处理，已重新入队"),
                Err(e) => warn!(message_id = %message.id, "消息重新入队失败: {}", e),
            }
        }
    }

    /// 轮询任务队列直到收到停止信号
    ///
    /// 停止后不再拉取新消息，已拉取但未获得执行槽位的消息重新入队；
    /// 等待进行中的任务最多 `shutdown_timeout_seconds`，
    /// 超时后取消剩余任务并等待其清理完成。
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_jobs));
        let job_cancel = CancellationToken::new();
        let mut in_flight = JoinSet::new();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            queue = %self.job_queue,
            max_concurrent_jobs = self.max_concurrent_jobs,
            "开始消费任务消息"
        );

        'poll: loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("任务消费收到停止信号");
                    break;
                }
                _ = ticker.tick() => {}
            }

            while in_flight.try_join_next().is_some() {}

            if semaphore.available_permits() == 0 {
                continue;
            }

            let messages = match self.message_queue.consume_messages(&self.job_queue).await {
                Ok(messages) => messages,
                Err(OrchestratorError::NotSupported(reason)) => {
                    error!("当前环境未接入消息传输，停止消费: {}", reason);
                    break;
                }
                Err(e) => {
                    warn!("拉取任务消息失败: {}", e);
                    continue;
                }
            };

            let mut pending = messages.into_iter();
            while let Some(message) = pending.next() {
                let permit = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                };
                let Some(permit) = permit else {
                    info!("任务消费收到停止信号");
                    self.requeue(std::iter::once(message).chain(pending)).await;
                    break 'poll;
                };

                let consumer = Arc::clone(&self);
                let cancel = job_cancel.clone();
                in_flight.spawn(async move {
                    let _permit = permit;
                    consumer.consume(message, &cancel).await
                });
            }
        }

        if in_flight.is_empty() {
            info!("任务消费已停止");
            return;
        }

        info!("等待 {} 个进行中的任务完成", in_flight.len());
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                "等待任务超时 ({}秒)，取消剩余 {} 个任务",
                self.shutdown_timeout.as_secs(),
                in_flight.len()
            );
            job_cancel.cancel();
            while in_flight.join_next().await.is_some() {}
        }

        info!("任务消费已停止");
    }
}

/// 错误及其全部来源，逐层以 `: ` 连接
fn error_chain(error: &OrchestratorError) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知的panic".to_string()
    }
}
