use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use orchestrator_core::{
    config::models::{StrategyConfig, StrategyKind},
    ContractKey, ExecutionStrategy, JobLog, LegacyJobFactory, OrchestratorError,
    OrchestratorResult,
};
use orchestrator_infrastructure::RetryPublisher;

use crate::jobs::{HttpJobFactory, ShellJobFactory};
use crate::strategy::LifecycleStrategy;

/// 根据 `strategies` 配置创建执行策略
pub struct StrategyFactory;

impl StrategyFactory {
    pub fn build(
        configs: &[StrategyConfig],
        job_log: Arc<dyn JobLog>,
        retry: Arc<RetryPublisher>,
    ) -> OrchestratorResult<Vec<Arc<dyn ExecutionStrategy>>> {
        let client = reqwest::Client::new();

        configs
            .iter()
            .map(|config| -> OrchestratorResult<Arc<dyn ExecutionStrategy>> {
                config
                    .validate()
                    .map_err(|e| OrchestratorError::Configuration(e.to_string()))?;

                let contract_key = ContractKey::new(config.contract_key.as_str())?;
                let timeout = Duration::from_secs(config.timeout_seconds);

                let factory: Arc<dyn LegacyJobFactory> = match config.kind {
                    StrategyKind::Http => {
                        let url = config.url.clone().ok_or_else(|| {
                            OrchestratorError::Configuration(format!(
                                "HTTP策略 {contract_key} 缺少url"
                            ))
                        })?;
                        Arc::new(HttpJobFactory::new(
                            client.clone(),
                            url,
                            timeout,
                            Arc::clone(&retry),
                        ))
                    }
                    StrategyKind::Shell => {
                        let command = config.command.clone().ok_or_else(|| {
                            OrchestratorError::Configuration(format!(
                                "Shell策略 {contract_key} 缺少command"
                            ))
                        })?;
                        Arc::new(ShellJobFactory::new(
                            command,
                            config.args.clone(),
                            timeout,
                            Arc::clone(&retry),
                        ))
                    }
                };

                info!("创建执行策略: contract_key={}, kind={:?}", contract_key, config.kind);

                let strategy = LifecycleStrategy::new(contract_key, factory, Arc::clone(&job_log));
                Ok(Arc::new(strategy))
            })
            .collect()
    }
}
