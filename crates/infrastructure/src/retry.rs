use std::sync::Arc;

use tracing::info;

use orchestrator_core::{JobDescriptor, Message, MessageQueue, OrchestratorResult};

/// 将失败的任务作为新的执行单元重新提交到任务队列
pub struct RetryPublisher {
    message_queue: Arc<dyn MessageQueue>,
    job_queue: String,
}

impl RetryPublisher {
    pub fn new(message_queue: Arc<dyn MessageQueue>, job_queue: impl Into<String>) -> Self {
        Self {
            message_queue,
            job_queue: job_queue.into(),
        }
    }

    /// 发布重试任务，返回新执行单元的描述符
    pub async fn resubmit(&self, descriptor: &JobDescriptor) -> OrchestratorResult<JobDescriptor> {
        let retry = descriptor.retry_attempt();
        let message = Message::job_execution(&retry)?;
        self.message_queue
            .publish_message(&self.job_queue, &message)
            .await?;

        info!(
            job_id = %descriptor.job_id(),
            retry_job_id = %retry.job_id(),
            contract_key = %descriptor.contract_key(),
            "已重新提交任务"
        );
        Ok(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::{JobStep, OrchestratorError};
    use orchestrator_testing_utils::{MockMessageQueue, PublishFailure, TestDescriptorBuilder};

    #[tokio::test]
    async fn test_resubmit_publishes_new_unit_of_work() {
        let queue = Arc::new(MockMessageQueue::new());
        let publisher = RetryPublisher::new(queue.clone(), "job_execution");
        let original = TestDescriptorBuilder::new("X")
            .with_ids(7, 8, 9)
            .with_time_zone("UTC")
            .build();

        let retry = publisher.resubmit(&original).await.unwrap();

        assert_ne!(retry.job_id(), original.job_id());
        assert_eq!(retry.step(), JobStep::Retry);
        assert_eq!(retry.contract_key(), original.contract_key());

        let published = queue.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "job_execution");
        let decoded = published[0].1.decode_job().unwrap();
        assert_eq!(decoded.job_id(), retry.job_id());
        assert_eq!(
            (decoded.source_id(), decoded.integration_id(), decoded.server_id()),
            (7, 8, 9)
        );
        assert_eq!(decoded.time_zone(), Some("UTC"));
    }

    #[tokio::test]
    async fn test_resubmit_surfaces_transport_failure() {
        let queue = Arc::new(MockMessageQueue::failing_with(PublishFailure::Broken));
        let publisher = RetryPublisher::new(queue, "job_execution");

        let result = publisher
            .resubmit(&TestDescriptorBuilder::new("X").build())
            .await;
        assert!(matches!(result, Err(OrchestratorError::MessageQueue(_))));
    }
}
