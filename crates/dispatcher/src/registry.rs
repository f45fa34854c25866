use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use orchestrator_core::{ContractKey, ExecutionStrategy, OrchestratorError, OrchestratorResult};

/// 合约键到执行策略的查找表
///
/// 启动时构建一次，之后只读，可以在不加锁的情况下并发读取。
pub struct StrategyRegistry {
    strategies: HashMap<ContractKey, Arc<dyn ExecutionStrategy>>,
}

impl StrategyRegistry {
    /// 从全部已注册策略构建注册表，合约键重复时构建失败
    pub fn new<I>(strategies: I) -> OrchestratorResult<Self>
    where
        I: IntoIterator<Item = Arc<dyn ExecutionStrategy>>,
    {
        let mut registry = HashMap::new();

        for strategy in strategies {
            let key = strategy.contract_key().clone();
            if registry.contains_key(&key) {
                return Err(OrchestratorError::DuplicateStrategy {
                    contract_key: key.to_string(),
                });
            }
            info!(contract_key = %key, strategy = strategy.name(), "注册执行策略");
            registry.insert(key, strategy);
        }

        Ok(Self {
            strategies: registry,
        })
    }

    /// 查找合约键对应的策略；未注册属于配置缺陷
    pub fn get_strategy(&self, contract_key: &str) -> OrchestratorResult<Arc<dyn ExecutionStrategy>> {
        self.strategies
            .get(contract_key)
            .cloned()
            .ok_or_else(|| OrchestratorError::StrategyNotFound {
                contract_key: contract_key.to_string(),
            })
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// 已注册的合约键，按字典序排列
    pub fn contract_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.strategies.keys().map(ContractKey::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("contract_keys", &self.contract_keys())
            .finish()
    }
}
