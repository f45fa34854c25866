use std::sync::Arc;

use orchestrator_core::{CancellationToken, ExecutionStrategy, OrchestratorError};
use orchestrator_dispatcher::{ExecutionService, JobExecutionService, JobRouter, StrategyRegistry};
use orchestrator_testing_utils::{
    descriptor, FakeStrategy, MockMessageQueue, MockToggleStore, PublishFailure, StrategyBehavior,
};

const FEATURE: &str = "JobBrokerRouting";

fn service(strategy: Arc<dyn ExecutionStrategy>) -> ExecutionService {
    ExecutionService::new(Arc::new(StrategyRegistry::new(vec![strategy]).unwrap()))
}

/// 调用方的派发方式：路由失败时同步执行
async fn dispatch(
    router: &JobRouter,
    service: &ExecutionService,
    key: &str,
) -> Result<bool, OrchestratorError> {
    let descriptor = descriptor(key);
    if router.try_route(&descriptor).await {
        return Ok(true);
    }
    service
        .execute_job(descriptor, &CancellationToken::new())
        .await
        .map(|()| false)
}

#[tokio::test]
async fn test_enabled_key_is_published_not_executed() {
    let strategy = FakeStrategy::succeeding("X");
    let queue = Arc::new(MockMessageQueue::new());
    let router = JobRouter::new(
        Arc::new(MockToggleStore::with_enabled(FEATURE, &["X"])),
        queue.clone(),
        "job_execution",
        FEATURE,
    );

    let routed = dispatch(&router, &service(strategy.clone()), "X")
        .await
        .unwrap();

    assert!(routed);
    assert_eq!(queue.published_count(), 1);
    assert_eq!(strategy.call_count(), 0);
}

#[tokio::test]
async fn test_broken_transport_falls_back_to_inline_execution() {
    let strategy = FakeStrategy::succeeding("X");
    let router = JobRouter::new(
        Arc::new(MockToggleStore::with_enabled(FEATURE, &["X"])),
        Arc::new(MockMessageQueue::failing_with(PublishFailure::Broken)),
        "job_execution",
        FEATURE,
    );

    let routed = dispatch(&router, &service(strategy.clone()), "X")
        .await
        .unwrap();

    assert!(!routed);
    assert_eq!(strategy.call_count(), 1);
}

#[tokio::test]
async fn test_inline_failure_reaches_caller() {
    let strategy = Arc::new(FakeStrategy::new("X", StrategyBehavior::Fail));
    let router = JobRouter::new(
        Arc::new(MockToggleStore::new()),
        Arc::new(MockMessageQueue::new()),
        "job_execution",
        FEATURE,
    );

    let result = dispatch(&router, &service(strategy), "X").await;

    assert!(matches!(result, Err(OrchestratorError::JobFailed { .. })));
}
