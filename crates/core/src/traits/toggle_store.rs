use async_trait::async_trait;

use crate::OrchestratorResult;

/// 功能开关存储
///
/// 返回某个功能当前启用的合约键列表。读取结果可能是最终一致的，
/// 调用方不应跨调用缓存。
#[async_trait]
pub trait ToggleStore: Send + Sync {
    async fn get_enabled_contract_keys(&self, feature_name: &str)
        -> OrchestratorResult<Vec<String>>;
}
