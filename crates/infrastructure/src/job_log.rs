use async_trait::async_trait;
use tracing::{info, warn};

use orchestrator_core::{JobDescriptor, JobLog, OrchestratorError, OrchestratorResult};

/// 以结构化 tracing 事件记录任务日志
///
/// 异常以 `warn!` 记录；消息消费端才是失败的唯一错误日志出口。
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJobLog;

impl TracingJobLog {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobLog for TracingJobLog {
    async fn start(&self, descriptor: &JobDescriptor) -> OrchestratorResult<()> {
        info!(
            target: "job_log",
            job_id = %descriptor.job_id(),
            contract_key = %descriptor.contract_key(),
            step = %descriptor.step(),
            source_id = descriptor.source_id(),
            integration_id = descriptor.integration_id(),
            server_id = descriptor.server_id(),
            "任务开始"
        );
        Ok(())
    }

    async fn finish(&self, descriptor: &JobDescriptor) -> OrchestratorResult<()> {
        info!(
            target: "job_log",
            job_id = %descriptor.job_id(),
            contract_key = %descriptor.contract_key(),
            "任务执行完毕"
        );
        Ok(())
    }

    async fn log_exception(
        &self,
        descriptor: &JobDescriptor,
        error: &OrchestratorError,
    ) -> OrchestratorResult<()> {
        warn!(
            target: "job_log",
            job_id = %descriptor.job_id(),
            contract_key = %descriptor.contract_key(),
            error = %error,
            "任务执行异常"
        );
        Ok(())
    }
}
