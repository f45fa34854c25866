//! Mock implementations for collaborator traits
//!
//! 所有 mock 都是内存实现，记录调用顺序并支持注入失败，
//! 不依赖真实的消息队列或外部服务。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use orchestrator_core::{
    CancellationToken, ContractKey, ExecutionStrategy, JobDescriptor, JobLog,
    LegacyJob, LegacyJobFactory, Message, MessageQueue, OrchestratorError, OrchestratorResult,
    ToggleStore,
};

/// 任务实例与任务日志共享的调用时间线条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Initialize {
        source_id: i32,
        integration_id: i32,
        server_id: i32,
    },
    Started,
    PreExecute,
    Execute,
    Finish,
    PostExecute,
    Complete,
    Exception(String),
    RetryJob,
    Dispose,
}

/// 调用时间线，可在任务、任务日志与测试之间共享
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    events: Arc<Mutex<Vec<JobEvent>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: JobEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&JobEvent) -> bool,
    {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

/// 注入失败的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Initialize,
    PreExecute,
    Execute,
    PostExecute,
    Complete,
    RetryJob,
}

impl std::fmt::Display for FailurePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// 记录调用顺序的遗留任务
pub struct RecordingJob {
    timeline: Timeline,
    fail_at: Option<FailurePoint>,
    execute_delay: Option<Duration>,
}

impl RecordingJob {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            fail_at: None,
            execute_delay: None,
        }
    }

    pub fn failing_at(mut self, point: FailurePoint) -> Self {
        self.fail_at = Some(point);
        self
    }

    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    fn check(&self, point: FailurePoint) -> OrchestratorResult<()> {
        if self.fail_at == Some(point) {
            return Err(OrchestratorError::phase(point, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl LegacyJob for RecordingJob {
    fn initialize(&mut self, descriptor: &JobDescriptor) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::Initialize {
            source_id: descriptor.source_id(),
            integration_id: descriptor.integration_id(),
            server_id: descriptor.server_id(),
        });
        self.check(FailurePoint::Initialize)
    }

    async fn pre_execute(&mut self) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::PreExecute);
        self.check(FailurePoint::PreExecute)
    }

    async fn execute(&mut self) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::Execute);
        if let Some(delay) = self.execute_delay {
            tokio::time::sleep(delay).await;
        }
        self.check(FailurePoint::Execute)
    }

    async fn post_execute(&mut self) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::PostExecute);
        self.check(FailurePoint::PostExecute)
    }

    async fn complete(&mut self) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::Complete);
        self.check(FailurePoint::Complete)
    }

    async fn retry_job(&mut self) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::RetryJob);
        self.check(FailurePoint::RetryJob)
    }

    fn dispose(&mut self) {
        self.timeline.push(JobEvent::Dispose);
    }
}

/// 每次创建新的 [`RecordingJob`]，全部写入同一条时间线
pub struct RecordingJobFactory {
    timeline: Timeline,
    fail_at: Option<FailurePoint>,
    execute_delay: Option<Duration>,
    fail_create: bool,
    created: AtomicUsize,
}

impl RecordingJobFactory {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            fail_at: None,
            execute_delay: None,
            fail_create: false,
            created: AtomicUsize::new(0),
        }
    }

    pub fn failing_at(mut self, point: FailurePoint) -> Self {
        self.fail_at = Some(point);
        self
    }

    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl LegacyJobFactory for RecordingJobFactory {
    fn create(&self) -> OrchestratorResult<Box<dyn LegacyJob>> {
        if self.fail_create {
            return Err(OrchestratorError::Internal(
                "injected factory failure".to_string(),
            ));
        }
        self.created.fetch_add(1, Ordering::SeqCst);

        let mut job = RecordingJob::new(self.timeline.clone());
        job.fail_at = self.fail_at;
        job.execute_delay = self.execute_delay;
        Ok(Box::new(job))
    }
}

/// 记录调用的任务日志
pub struct RecordingJobLog {
    timeline: Timeline,
    fail_start: AtomicBool,
}

impl RecordingJobLog {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            fail_start: AtomicBool::new(false),
        }
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl JobLog for RecordingJobLog {
    async fn start(&self, _descriptor: &JobDescriptor) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::Started);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Internal("job log unavailable".to_string()));
        }
        Ok(())
    }

    async fn finish(&self, _descriptor: &JobDescriptor) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::Finish);
        Ok(())
    }

    async fn log_exception(
        &self,
        _descriptor: &JobDescriptor,
        error: &OrchestratorError,
    ) -> OrchestratorResult<()> {
        self.timeline.push(JobEvent::Exception(error.to_string()));
        Ok(())
    }
}

/// 测试用执行策略的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyBehavior {
    Succeed,
    Fail,
    Panic,
    /// 等待取消信号后返回 `Cancelled`
    WaitForCancel,
}

pub struct FakeStrategy {
    contract_key: ContractKey,
    behavior: StrategyBehavior,
    calls: AtomicUsize,
}

impl FakeStrategy {
    pub fn new(contract_key: &str, behavior: StrategyBehavior) -> Self {
        Self {
            contract_key: ContractKey::new(contract_key).expect("valid contract key"),
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(contract_key: &str) -> Arc<Self> {
        Arc::new(Self::new(contract_key, StrategyBehavior::Succeed))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionStrategy for FakeStrategy {
    fn contract_key(&self) -> &ContractKey {
        &self.contract_key
    }

    async fn execute(
        &self,
        descriptor: &JobDescriptor,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            StrategyBehavior::Succeed => Ok(()),
            StrategyBehavior::Fail => Err(OrchestratorError::JobFailed {
                job_id: descriptor.job_id(),
                contract_key: self.contract_key.to_string(),
                source: Box::new(OrchestratorError::phase("Execute", "provider returned 500")),
            }),
            StrategyBehavior::Panic => panic!("strategy {} panicked", self.contract_key),
            StrategyBehavior::WaitForCancel => {
                cancel.cancelled().await;
                Err(OrchestratorError::Cancelled)
            }
        }
    }
}

/// 可注入失败的内存功能开关
#[derive(Default)]
pub struct MockToggleStore {
    features: Mutex<HashMap<String, Vec<String>>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockToggleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(feature_name: &str, keys: &[&str]) -> Self {
        let store = Self::new();
        store.enable(feature_name, keys);
        store
    }

    pub fn enable(&self, feature_name: &str, keys: &[&str]) {
        self.features.lock().unwrap().insert(
            feature_name.to_string(),
            keys.iter().map(|k| k.to_string()).collect(),
        );
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToggleStore for MockToggleStore {
    async fn get_enabled_contract_keys(
        &self,
        feature_name: &str,
    ) -> OrchestratorResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(OrchestratorError::ToggleStore(
                "toggle store unreachable".to_string(),
            ));
        }
        Ok(self
            .features
            .lock()
            .unwrap()
            .get(feature_name)
            .cloned()
            .unwrap_or_default())
    }
}

/// 发布失败的注入方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFailure {
    NotSupported,
    Broken,
}

/// 记录发布、确认与拒绝的内存消息队列
#[derive(Default)]
pub struct MockMessageQueue {
    published: Mutex<Vec<(String, Message)>>,
    pending: Mutex<HashMap<String, VecDeque<Message>>>,
    acked: Mutex<Vec<String>>,
    nacked: Mutex<Vec<(String, bool)>>,
    publish_failure: Mutex<Option<PublishFailure>>,
    closed: AtomicBool,
}

impl MockMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(failure: PublishFailure) -> Self {
        let queue = Self::new();
        *queue.publish_failure.lock().unwrap() = Some(failure);
        queue
    }

    pub fn published(&self) -> Vec<(String, Message)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn push_pending(&self, queue: &str, message: Message) {
        self.pending
            .lock()
            .unwrap()
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
    }

    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }

    pub fn nacked(&self) -> Vec<(String, bool)> {
        self.nacked.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageQueue for MockMessageQueue {
    async fn publish_message(&self, queue: &str, message: &Message) -> OrchestratorResult<()> {
        match *self.publish_failure.lock().unwrap() {
            Some(PublishFailure::NotSupported) => {
                return Err(OrchestratorError::NotSupported(
                    "message transport is not wired".to_string(),
                ))
            }
            Some(PublishFailure::Broken) => {
                return Err(OrchestratorError::MessageQueue(
                    "connection reset by peer".to_string(),
                ))
            }
            None => {}
        }
        self.published
            .lock()
            .unwrap()
            .push((queue.to_string(), message.clone()));
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> OrchestratorResult<Vec<Message>> {
        Ok(self
            .pending
            .lock()
            .unwrap()
            .get_mut(queue)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default())
    }

    async fn ack_message(&self, message_id: &str) -> OrchestratorResult<()> {
        self.acked.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> OrchestratorResult<()> {
        self.nacked
            .lock()
            .unwrap()
            .push((message_id.to_string(), requeue));
        Ok(())
    }

    async fn close(&self) -> OrchestratorResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
