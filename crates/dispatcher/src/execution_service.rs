use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use orchestrator_core::{CancellationToken, JobDescriptor, OrchestratorResult};

use crate::registry::StrategyRegistry;

/// 任务执行服务接口
///
/// 不关心描述符是经消息队列送达还是由同步调用方直接传入。
#[async_trait]
pub trait JobExecutionService: Send + Sync {
    async fn execute_job(
        &self,
        descriptor: JobDescriptor,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()>;
}

/// 纯调度：查找策略并运行，不做重试和错误转换
#[derive(Debug, Clone)]
pub struct ExecutionService {
    registry: Arc<StrategyRegistry>,
}

impl ExecutionService {
    pub fn new(registry: Arc<StrategyRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl JobExecutionService for ExecutionService {
    async fn execute_job(
        &self,
        descriptor: JobDescriptor,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let strategy = self
            .registry
            .get_strategy(descriptor.contract_key().as_str())?;

        info!(
            job_id = %descriptor.job_id(),
            contract_key = %descriptor.contract_key(),
            strategy = strategy.name(),
            "选择执行策略"
        );

        strategy.execute(&descriptor, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::{ExecutionStrategy, OrchestratorError};
    use orchestrator_testing_utils::{descriptor, FakeStrategy, StrategyBehavior};

    fn service(strategies: Vec<Arc<FakeStrategy>>) -> ExecutionService {
        let registry = StrategyRegistry::new(
            strategies
                .into_iter()
                .map(|s| s as Arc<dyn ExecutionStrategy>),
        )
        .unwrap();
        ExecutionService::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_dispatches_to_matching_strategy() {
        let a = FakeStrategy::succeeding("A");
        let b = FakeStrategy::succeeding("B");
        let service = service(vec![a.clone(), b.clone()]);

        service
            .execute_job(descriptor("B"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(a.call_count(), 0);
        assert_eq!(b.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_key_propagates_registry_error() {
        let service = service(vec![FakeStrategy::succeeding("A")]);

        let result = service
            .execute_job(descriptor("C"), &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(OrchestratorError::StrategyNotFound { contract_key }) if contract_key == "C"
        ));
    }

    #[tokio::test]
    async fn test_strategy_failure_propagates() {
        let failing = Arc::new(FakeStrategy::new("A", StrategyBehavior::Fail));
        let service = service(vec![failing.clone()]);

        let result = service
            .execute_job(descriptor("A"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(OrchestratorError::JobFailed { .. })));
        assert_eq!(failing.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_is_not_suppressed() {
        let waiting = Arc::new(FakeStrategy::new("A", StrategyBehavior::WaitForCancel));
        let service = service(vec![waiting]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = service.execute_job(descriptor("A"), &cancel).await;
        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
    }
}
