//! 遗留任务对象与任务日志接口
//!
//! 执行策略按固定顺序驱动 [`LegacyJob`]：
//!
//! ```text
//! initialize → pre_execute → execute → post_execute → complete → dispose
//!                         (失败时) retry_job
//! ```

use async_trait::async_trait;

use crate::{
    models::JobDescriptor,
    OrchestratorError, OrchestratorResult,
};

/// 单次执行的遗留任务实例，由执行策略独占
#[async_trait]
pub trait LegacyJob: Send {
    /// 绑定描述符中的租户/供应商上下文
    fn initialize(&mut self, descriptor: &JobDescriptor) -> OrchestratorResult<()>;

    /// 供应商相关的准备工作
    async fn pre_execute(&mut self) -> OrchestratorResult<()>;

    /// 实际的数据搬运
    async fn execute(&mut self) -> OrchestratorResult<()>;

    /// 供应商相关的收尾或派生工作
    async fn post_execute(&mut self) -> OrchestratorResult<()>;

    /// 无论成功失败都会执行的完成步骤
    async fn complete(&mut self) -> OrchestratorResult<()>;

    /// 将本任务作为新的执行单元重新提交
    async fn retry_job(&mut self) -> OrchestratorResult<()>;

    /// 释放任务持有的资源
    fn dispose(&mut self);
}

/// 为每次执行创建新的任务实例
pub trait LegacyJobFactory: Send + Sync {
    fn create(&self) -> OrchestratorResult<Box<dyn LegacyJob>>;
}

impl<F> LegacyJobFactory for F
where
    F: Fn() -> OrchestratorResult<Box<dyn LegacyJob>> + Send + Sync,
{
    fn create(&self) -> OrchestratorResult<Box<dyn LegacyJob>> {
        self()
    }
}

/// 任务日志
#[async_trait]
pub trait JobLog: Send + Sync {
    async fn start(&self, descriptor: &JobDescriptor) -> OrchestratorResult<()>;

    async fn finish(&self, descriptor: &JobDescriptor) -> OrchestratorResult<()>;

    async fn log_exception(
        &self,
        descriptor: &JobDescriptor,
        error: &OrchestratorError,
    ) -> OrchestratorResult<()>;
}
