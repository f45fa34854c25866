use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use orchestrator_core::{
    JobDescriptor, JobMessage, LegacyJob, LegacyJobFactory, OrchestratorError, OrchestratorResult,
};
use orchestrator_infrastructure::RetryPublisher;

/// 将任务信封 POST 到供应商接口的任务
///
/// 非 2xx 响应视为执行失败。
pub struct HttpJob {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    retry: Arc<RetryPublisher>,
    descriptor: Option<JobDescriptor>,
    payload: Option<Vec<u8>>,
    status: Option<u16>,
    started_at: Option<Instant>,
}

impl HttpJob {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        timeout: Duration,
        retry: Arc<RetryPublisher>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
            retry,
            descriptor: None,
            payload: None,
            status: None,
            started_at: None,
        }
    }

    fn descriptor(&self) -> OrchestratorResult<&JobDescriptor> {
        self.descriptor
            .as_ref()
            .ok_or_else(|| OrchestratorError::Internal("HTTP任务尚未初始化".to_string()))
    }
}

#[async_trait]
impl LegacyJob for HttpJob {
    fn initialize(&mut self, descriptor: &JobDescriptor) -> OrchestratorResult<()> {
        self.descriptor = Some(descriptor.clone());
        self.started_at = Some(Instant::now());
        Ok(())
    }

    async fn pre_execute(&mut self) -> OrchestratorResult<()> {
        let payload = serde_json::to_vec(&JobMessage::from(self.descriptor()?))?;
        self.payload = Some(payload);
        Ok(())
    }

    async fn execute(&mut self) -> OrchestratorResult<()> {
        let payload = self
            .payload
            .clone()
            .ok_or_else(|| OrchestratorError::phase("Execute", "请求体尚未准备"))?;

        debug!("发送HTTP任务请求: url={}", self.url);

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| OrchestratorError::Http(format!("请求 {} 失败: {e}", self.url)))?;

        let status = response.status();
        self.status = Some(status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::phase(
                "Execute",
                format!("供应商接口返回 {status}: {}", body.trim()),
            ));
        }

        Ok(())
    }

    async fn post_execute(&mut self) -> OrchestratorResult<()> {
        debug!("HTTP任务响应状态: {:?}", self.status);
        Ok(())
    }

    async fn complete(&mut self) -> OrchestratorResult<()> {
        let job_id = self.descriptor()?.job_id();
        let elapsed = self.started_at.map(|t| t.elapsed().as_millis()).unwrap_or_default();
        info!(
            "HTTP任务结束: job_id={}, status={:?}, duration={}ms",
            job_id, self.status, elapsed
        );
        Ok(())
    }

    async fn retry_job(&mut self) -> OrchestratorResult<()> {
        let descriptor = self.descriptor()?.clone();
        self.retry.resubmit(&descriptor).await.map(|_| ())
    }

    fn dispose(&mut self) {
        self.descriptor = None;
        self.payload = None;
    }
}

/// 为每次执行创建新的 [`HttpJob`]，共享同一个 HTTP 客户端
pub struct HttpJobFactory {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    retry: Arc<RetryPublisher>,
}

impl HttpJobFactory {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        timeout: Duration,
        retry: Arc<RetryPublisher>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
            retry,
        }
    }
}

impl LegacyJobFactory for HttpJobFactory {
    fn create(&self) -> OrchestratorResult<Box<dyn LegacyJob>> {
        Ok(Box::new(HttpJob::new(
            self.client.clone(),
            self.url.clone(),
            self.timeout,
            Arc::clone(&self.retry),
        )))
    }
}
