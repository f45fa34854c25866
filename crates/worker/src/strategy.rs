use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use orchestrator_core::{
    CancellationToken, ContractKey, ExecutionStrategy, JobDescriptor, JobLog, LegacyJob,
    LegacyJobFactory, OrchestratorError, OrchestratorResult,
};

use crate::lifecycle::{JobLifecycle, LifecyclePhase};

/// 驱动遗留任务生命周期的执行策略
///
/// 每次执行都从工厂创建新的任务实例。完成与释放步骤无论成功、失败或取消都会执行，
/// 且不受取消信号影响；执行 future 被丢弃时由 [`JobLease`] 兜底释放。
pub struct LifecycleStrategy {
    contract_key: ContractKey,
    name: String,
    factory: Arc<dyn LegacyJobFactory>,
    job_log: Arc<dyn JobLog>,
}

impl LifecycleStrategy {
    pub fn new(
        contract_key: ContractKey,
        factory: Arc<dyn LegacyJobFactory>,
        job_log: Arc<dyn JobLog>,
    ) -> Self {
        let name = format!("lifecycle:{contract_key}");
        Self {
            contract_key,
            name,
            factory,
            job_log,
        }
    }

    async fn run_phases(
        &self,
        lifecycle: &mut JobLifecycle,
        job: &mut dyn LegacyJob,
        descriptor: &JobDescriptor,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        until_cancelled(cancel, self.job_log.start(descriptor)).await?;
        lifecycle.advance(LifecyclePhase::Started)?;

        until_cancelled(cancel, job.pre_execute()).await?;
        lifecycle.advance(LifecyclePhase::PreExecuted)?;

        until_cancelled(cancel, job.execute()).await?;
        lifecycle.advance(LifecyclePhase::Executed)?;

        until_cancelled(cancel, self.job_log.finish(descriptor)).await?;
        lifecycle.advance(LifecyclePhase::Finished)?;

        until_cancelled(cancel, job.post_execute()).await?;
        lifecycle.advance(LifecyclePhase::PostExecuted)?;

        Ok(())
    }

    /// 记录异常并重新提交一次，两者自身的失败只记录不传播
    async fn handle_failure(
        &self,
        job: &mut dyn LegacyJob,
        descriptor: &JobDescriptor,
        error: &OrchestratorError,
        cancel: &CancellationToken,
    ) {
        if let Err(e) = self.job_log.log_exception(descriptor, error).await {
            warn!(job_id = %descriptor.job_id(), "记录任务异常失败: {}", e);
        }

        match until_cancelled(cancel, job.retry_job()).await {
            Ok(()) => debug!(job_id = %descriptor.job_id(), "已安排任务重试"),
            Err(e) if e.is_cancelled() => {
                warn!(job_id = %descriptor.job_id(), "任务已取消，跳过重试")
            }
            Err(e) => warn!(job_id = %descriptor.job_id(), "安排任务重试失败: {}", e),
        }
    }
}

#[async_trait]
impl ExecutionStrategy for LifecycleStrategy {
    fn contract_key(&self) -> &ContractKey {
        &self.contract_key
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        descriptor: &JobDescriptor,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let job_id = descriptor.job_id();
        if cancel.is_cancelled() {
            debug!(job_id = %job_id, "任务开始前已取消");
            return Err(OrchestratorError::Cancelled);
        }

        let started_at = Instant::now();
        let mut lease = JobLease::new(self.factory.create()?);

        if let Err(e) = lease.job().initialize(descriptor) {
            warn!(job_id = %job_id, contract_key = %self.contract_key, "任务初始化失败: {}", e);
            lease.release_without_complete();
            return Err(OrchestratorError::JobInitialization {
                job_id,
                message: e.to_string(),
            });
        }

        let mut lifecycle = JobLifecycle::initialized();
        let outcome = self
            .run_phases(&mut lifecycle, lease.job(), descriptor, cancel)
            .await;

        let result = match outcome {
            Ok(()) => lifecycle.advance(LifecyclePhase::Completed),
            Err(e) => {
                let step = lifecycle.phase().pending_step();
                if let Err(transition) = lifecycle.fail() {
                    warn!(job_id = %job_id, "{}", transition);
                }

                if e.is_cancelled() {
                    warn!(job_id = %job_id, step, "任务执行被取消");
                    Err(OrchestratorError::Cancelled)
                } else {
                    warn!(job_id = %job_id, contract_key = %self.contract_key, step, "任务执行失败: {}", e);
                    self.handle_failure(lease.job(), descriptor, &e, cancel).await;
                    Err(OrchestratorError::JobFailed {
                        job_id,
                        contract_key: self.contract_key.to_string(),
                        source: Box::new(e),
                    })
                }
            }
        };

        lease.release().await;

        info!(
            job_id = %job_id,
            contract_key = %self.contract_key,
            phase = %lifecycle.phase(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "任务生命周期结束"
        );

        result
    }
}

async fn until_cancelled<F>(cancel: &CancellationToken, future: F) -> OrchestratorResult<()>
where
    F: Future<Output = OrchestratorResult<()>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
        result = future => result,
    }
}

/// 独占任务实例，保证释放步骤恰好执行一次
struct JobLease {
    job: Box<dyn LegacyJob>,
    released: bool,
}

impl JobLease {
    fn new(job: Box<dyn LegacyJob>) -> Self {
        Self {
            job,
            released: false,
        }
    }

    fn job(&mut self) -> &mut dyn LegacyJob {
        self.job.as_mut()
    }

    /// 执行完成步骤后释放
    async fn release(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.job.complete().await {
            warn!("任务完成步骤失败: {}", e);
        }
        self.release_without_complete();
    }

    fn release_without_complete(&mut self) {
        if !self.released {
            self.released = true;
            self.job.dispose();
        }
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        if !self.released {
            warn!("任务执行被中断，跳过完成步骤直接释放");
            self.release_without_complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_testing_utils::{
        descriptor, FailurePoint, JobEvent, RecordingJobFactory, RecordingJobLog,
        TestDescriptorBuilder, Timeline,
    };
    use std::time::Duration;

    fn strategy(factory: RecordingJobFactory, timeline: &Timeline) -> (LifecycleStrategy, Arc<RecordingJobLog>) {
        let job_log = Arc::new(RecordingJobLog::new(timeline.clone()));
        let strategy = LifecycleStrategy::new(
            ContractKey::new("X").unwrap(),
            Arc::new(factory),
            job_log.clone(),
        );
        (strategy, job_log)
    }

    fn is_exception(event: &JobEvent) -> bool {
        matches!(event, JobEvent::Exception(_))
    }

    #[tokio::test]
    async fn test_successful_run_order() {
        let timeline = Timeline::new();
        let (strategy, _) = strategy(RecordingJobFactory::new(timeline.clone()), &timeline);
        let descriptor = TestDescriptorBuilder::new("X").with_ids(1, 2, 3).build();

        strategy
            .execute(&descriptor, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            timeline.events(),
            vec![
                JobEvent::Initialize {
                    source_id: 1,
                    integration_id: 2,
                    server_id: 3
                },
                JobEvent::Started,
                JobEvent::PreExecute,
                JobEvent::Execute,
                JobEvent::Finish,
                JobEvent::PostExecute,
                JobEvent::Complete,
                JobEvent::Dispose,
            ]
        );
    }

    #[tokio::test]
    async fn test_execute_failure_records_and_retries_once() {
        let timeline = Timeline::new();
        let factory = RecordingJobFactory::new(timeline.clone()).failing_at(FailurePoint::Execute);
        let (strategy, _) = strategy(factory, &timeline);

        let result = strategy
            .execute(&descriptor("X"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(OrchestratorError::JobFailed { .. })));
        assert_eq!(timeline.count(is_exception), 1);
        assert_eq!(timeline.count(|e| *e == JobEvent::RetryJob), 1);
        assert_eq!(timeline.count(|e| *e == JobEvent::Finish), 0);
        assert_eq!(timeline.count(|e| *e == JobEvent::PostExecute), 0);

        let events = timeline.events();
        assert_eq!(
            &events[events.len() - 4..],
            &[
                JobEvent::Exception("任务阶段 Execute 执行失败: injected failure".to_string()),
                JobEvent::RetryJob,
                JobEvent::Complete,
                JobEvent::Dispose,
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_in_every_phase_still_cleans_up() {
        for point in [
            FailurePoint::PreExecute,
            FailurePoint::Execute,
            FailurePoint::PostExecute,
        ] {
            let timeline = Timeline::new();
            let factory = RecordingJobFactory::new(timeline.clone()).failing_at(point);
            let (strategy, _) = strategy(factory, &timeline);

            let result = strategy
                .execute(&descriptor("X"), &CancellationToken::new())
                .await;

            assert!(result.is_err(), "{point} should fail the run");
            assert_eq!(timeline.count(is_exception), 1, "{point}");
            assert_eq!(timeline.count(|e| *e == JobEvent::RetryJob), 1, "{point}");
            assert_eq!(timeline.count(|e| *e == JobEvent::Complete), 1, "{point}");
            assert_eq!(timeline.count(|e| *e == JobEvent::Dispose), 1, "{point}");
        }
    }

    #[tokio::test]
    async fn test_job_log_start_failure_is_a_job_failure() {
        let timeline = Timeline::new();
        let (strategy, job_log) = strategy(RecordingJobFactory::new(timeline.clone()), &timeline);
        job_log.set_fail_start(true);

        let result = strategy
            .execute(&descriptor("X"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(OrchestratorError::JobFailed { .. })));
        assert_eq!(timeline.count(|e| *e == JobEvent::PreExecute), 0);
        assert_eq!(timeline.count(|e| *e == JobEvent::RetryJob), 1);
        assert_eq!(timeline.count(|e| *e == JobEvent::Dispose), 1);
    }

    #[tokio::test]
    async fn test_complete_failure_does_not_change_outcome() {
        let timeline = Timeline::new();
        let factory = RecordingJobFactory::new(timeline.clone()).failing_at(FailurePoint::Complete);
        let (strategy, _) = strategy(factory, &timeline);

        let result = strategy
            .execute(&descriptor("X"), &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(timeline.count(|e| *e == JobEvent::Dispose), 1);
        assert_eq!(timeline.count(is_exception), 0);
    }

    #[tokio::test]
    async fn test_initialize_failure_disposes_without_job_log() {
        let timeline = Timeline::new();
        let factory = RecordingJobFactory::new(timeline.clone()).failing_at(FailurePoint::Initialize);
        let (strategy, _) = strategy(factory, &timeline);

        let result = strategy
            .execute(&descriptor("X"), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(OrchestratorError::JobInitialization { .. })
        ));
        let events = timeline.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], JobEvent::Dispose);
    }

    #[tokio::test]
    async fn test_factory_failure_propagates() {
        let timeline = Timeline::new();
        let factory = RecordingJobFactory::new(timeline.clone()).failing_create();
        let (strategy, _) = strategy(factory, &timeline);

        let result = strategy
            .execute(&descriptor("X"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(OrchestratorError::Internal(_))));
        assert!(timeline.events().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_job_instance_per_execution() {
        let timeline = Timeline::new();
        let factory = Arc::new(RecordingJobFactory::new(timeline.clone()));
        let strategy = LifecycleStrategy::new(
            ContractKey::new("X").unwrap(),
            factory.clone(),
            Arc::new(RecordingJobLog::new(timeline.clone())),
        );

        for _ in 0..3 {
            strategy
                .execute(&descriptor("X"), &CancellationToken::new())
                .await
                .unwrap();
        }

        assert_eq!(factory.created_count(), 3);
        assert_eq!(timeline.count(|e| *e == JobEvent::Dispose), 3);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_skips_job_creation() {
        let timeline = Timeline::new();
        let factory = Arc::new(RecordingJobFactory::new(timeline.clone()));
        let strategy = LifecycleStrategy::new(
            ContractKey::new("X").unwrap(),
            factory.clone(),
            Arc::new(RecordingJobLog::new(timeline.clone())),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = strategy.execute(&descriptor("X"), &cancel).await;

        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
        assert_eq!(factory.created_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_mid_execute_still_cleans_up() {
        let timeline = Timeline::new();
        let factory = RecordingJobFactory::new(timeline.clone())
            .with_execute_delay(Duration::from_secs(30));
        let (strategy, _) = strategy(factory, &timeline);
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let result = strategy.execute(&descriptor("X"), &cancel).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
        assert_eq!(timeline.count(is_exception), 0);
        assert_eq!(timeline.count(|e| *e == JobEvent::RetryJob), 0);
        assert_eq!(timeline.count(|e| *e == JobEvent::Finish), 0);
        let events = timeline.events();
        assert_eq!(
            &events[events.len() - 2..],
            &[JobEvent::Complete, JobEvent::Dispose]
        );
    }

    #[tokio::test]
    async fn test_dropped_execution_still_disposes() {
        let timeline = Timeline::new();
        let factory = RecordingJobFactory::new(timeline.clone())
            .with_execute_delay(Duration::from_secs(30));
        let (strategy, _) = strategy(factory, &timeline);
        let descriptor = descriptor("X");
        let cancel = CancellationToken::new();

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            strategy.execute(&descriptor, &cancel),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(timeline.count(|e| *e == JobEvent::Dispose), 1);
        assert_eq!(timeline.count(|e| *e == JobEvent::Complete), 0);
    }
}
