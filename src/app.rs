use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use orchestrator_core::{
    config::AppConfig, CancellationToken, ExecutionStrategy, JobDescriptor, JobLog, MessageQueue,
    ToggleStore,
};
use orchestrator_dispatcher::{
    ExecutionService, JobExecutionService, JobRouter, RouteDecision, StrategyRegistry,
};
use orchestrator_infrastructure::{
    toggle_store_from_config, MessageQueueFactory, RetryPublisher, TracingJobLog,
};
use orchestrator_worker::{JobConsumer, StrategyFactory};

/// 一次派发的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 已发布到消息代理，由 worker 异步执行
    Routed,
    /// 未发布，已在当前进程同步执行完毕
    ExecutedInline(RouteDecision),
}

/// 按配置组装的编排核心
pub struct Application {
    config: AppConfig,
    message_queue: Arc<dyn MessageQueue>,
    router: JobRouter,
    execution: Arc<ExecutionService>,
}

impl Application {
    /// 按配置创建消息传输与执行策略
    pub async fn new(config: AppConfig) -> Result<Self> {
        let message_queue = MessageQueueFactory::create(&config.message_queue)
            .await
            .context("创建消息队列失败")?;

        let toggles = toggle_store_from_config(&config.routing).context("创建功能开关存储失败")?;

        let job_log: Arc<dyn JobLog> = Arc::new(TracingJobLog::new());
        let retry = Arc::new(RetryPublisher::new(
            Arc::clone(&message_queue),
            config.message_queue.job_queue.clone(),
        ));
        let strategies = StrategyFactory::build(&config.strategies, job_log, retry)
            .context("创建执行策略失败")?;

        Self::from_parts(config, message_queue, toggles, strategies)
    }

    /// 使用外部提供的组件组装
    pub fn from_parts(
        config: AppConfig,
        message_queue: Arc<dyn MessageQueue>,
        toggles: Arc<dyn ToggleStore>,
        strategies: Vec<Arc<dyn ExecutionStrategy>>,
    ) -> Result<Self> {
        let registry = StrategyRegistry::new(strategies).context("注册执行策略失败")?;
        if registry.is_empty() {
            warn!("没有配置任何执行策略，所有任务都会因找不到策略而失败");
        }
        info!("已注册执行策略: {:?}", registry.contract_keys());

        let execution = Arc::new(ExecutionService::new(Arc::new(registry)));
        let router = JobRouter::new(
            toggles,
            Arc::clone(&message_queue),
            config.message_queue.job_queue.clone(),
            config.routing.feature_name.clone(),
        );

        Ok(Self {
            config,
            message_queue,
            router,
            execution,
        })
    }

    /// 先尝试经消息代理派发，未发布时在当前进程同步执行
    pub async fn dispatch(&self, descriptor: JobDescriptor) -> Result<DispatchOutcome> {
        let decision = self.router.route(&descriptor).await;
        if decision.is_published() {
            return Ok(DispatchOutcome::Routed);
        }

        let job_id = descriptor.job_id();
        info!(job_id = %job_id, ?decision, "任务未发布，回退到同步执行");
        self.execution
            .execute_job(descriptor, &CancellationToken::new())
            .await
            .with_context(|| format!("同步执行任务失败: job_id={job_id}"))?;

        Ok(DispatchOutcome::ExecutedInline(decision))
    }

    /// 运行任务消费循环直到收到停止信号
    pub async fn run_worker(&self, shutdown: CancellationToken) -> Result<()> {
        info!(worker_id = %self.config.worker.worker_id, "启动任务消费者");

        let consumer = Arc::new(JobConsumer::new(
            Arc::clone(&self.message_queue),
            self.execution.clone(),
            self.config.message_queue.job_queue.clone(),
            &self.config.worker,
        ));
        consumer.run(shutdown).await;

        if let Err(e) = self.message_queue.close().await {
            warn!("关闭消息队列连接失败: {}", e);
        }
        info!("任务消费者已停止");
        Ok(())
    }
}
