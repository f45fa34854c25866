use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use orchestrator_core::{
    JobDescriptor, LegacyJob, LegacyJobFactory, OrchestratorError, OrchestratorResult,
};
use orchestrator_infrastructure::RetryPublisher;

/// 运行配置命令的任务
///
/// 描述符中的标识通过环境变量传给子进程，非零退出码视为执行失败。
/// 子进程随任务 future 一起被丢弃时会被终止。
pub struct ShellJob {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    retry: Arc<RetryPublisher>,
    descriptor: Option<JobDescriptor>,
    exit_code: Option<i32>,
    output: Option<String>,
}

impl ShellJob {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        retry: Arc<RetryPublisher>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
            retry,
            descriptor: None,
            exit_code: None,
            output: None,
        }
    }

    fn descriptor(&self) -> OrchestratorResult<&JobDescriptor> {
        self.descriptor
            .as_ref()
            .ok_or_else(|| OrchestratorError::Internal("Shell任务尚未初始化".to_string()))
    }

    fn build_command(&self, descriptor: &JobDescriptor) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("ORCHESTRATOR_JOB_ID", descriptor.job_id().to_string())
            .env("ORCHESTRATOR_CONTRACT_KEY", descriptor.contract_key().as_str())
            .env("ORCHESTRATOR_STEP", descriptor.step().as_str())
            .env("ORCHESTRATOR_SOURCE_ID", descriptor.source_id().to_string())
            .env(
                "ORCHESTRATOR_INTEGRATION_ID",
                descriptor.integration_id().to_string(),
            )
            .env("ORCHESTRATOR_SERVER_ID", descriptor.server_id().to_string());

        if let Some(time_zone) = descriptor.time_zone() {
            cmd.env("ORCHESTRATOR_TIME_ZONE", time_zone);
        }

        cmd
    }
}

#[async_trait]
impl LegacyJob for ShellJob {
    fn initialize(&mut self, descriptor: &JobDescriptor) -> OrchestratorResult<()> {
        self.descriptor = Some(descriptor.clone());
        Ok(())
    }

    async fn pre_execute(&mut self) -> OrchestratorResult<()> {
        self.descriptor()?;
        Ok(())
    }

    async fn execute(&mut self) -> OrchestratorResult<()> {
        let descriptor = self.descriptor()?;
        let start_time = Instant::now();

        info!(
            "执行Shell任务: job_id={}, command={}, args={:?}",
            descriptor.job_id(),
            self.command,
            self.args
        );

        let child = self.build_command(descriptor).spawn().map_err(|e| {
            OrchestratorError::phase("Execute", format!("启动Shell命令失败: {e}"))
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                OrchestratorError::phase(
                    "Execute",
                    format!("Shell命令执行超时 ({}秒)", self.timeout.as_secs()),
                )
            })??;

        let exit_code = output.status.code();
        self.exit_code = exit_code;
        self.output = Some(String::from_utf8_lossy(&output.stdout).trim_end().to_string());

        info!(
            "Shell任务执行完成: success={}, exit_code={:?}, duration={}ms",
            output.status.success(),
            exit_code,
            start_time.elapsed().as_millis()
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::phase(
                "Execute",
                format!("命令执行失败，退出码: {exit_code:?}, stderr: {}", stderr.trim()),
            ));
        }

        Ok(())
    }

    async fn post_execute(&mut self) -> OrchestratorResult<()> {
        if let Some(output) = self.output.as_deref().filter(|o| !o.is_empty()) {
            info!("Shell任务输出: {}", output);
        }
        Ok(())
    }

    async fn complete(&mut self) -> OrchestratorResult<()> {
        if self.exit_code.is_none() {
            warn!("Shell任务结束时没有退出码: command={}", self.command);
        }
        Ok(())
    }

    async fn retry_job(&mut self) -> OrchestratorResult<()> {
        let descriptor = self.descriptor()?.clone();
        self.retry.resubmit(&descriptor).await.map(|_| ())
    }

    fn dispose(&mut self) {
        self.descriptor = None;
        self.output = None;
    }
}

pub struct ShellJobFactory {
    command: String,
    args: Vec<String>,
    timeout: Duration,
    retry: Arc<RetryPublisher>,
}

impl ShellJobFactory {
    pub fn new(
        command: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        retry: Arc<RetryPublisher>,
    ) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
            retry,
        }
    }
}

impl LegacyJobFactory for ShellJobFactory {
    fn create(&self) -> OrchestratorResult<Box<dyn LegacyJob>> {
        Ok(Box::new(ShellJob::new(
            self.command.clone(),
            self.args.clone(),
            self.timeout,
            Arc::clone(&self.retry),
        )))
    }
}
