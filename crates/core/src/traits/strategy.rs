use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    models::{ContractKey, JobDescriptor},
    OrchestratorResult,
};

/// 执行策略：每个任务族一个，声明自己负责的合约键
#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn contract_key(&self) -> &ContractKey;

    fn name(&self) -> &str {
        self.contract_key().as_str()
    }

    /// 运行一次任务生命周期。成功与否只通过返回值和任务日志体现。
    async fn execute(
        &self,
        descriptor: &JobDescriptor,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()>;
}
