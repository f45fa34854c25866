use serde::{Deserialize, Serialize};

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub max_concurrent_jobs: usize,
    pub poll_interval_ms: u64,
    pub shutdown_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "worker-001".to_string(),
            max_concurrent_jobs: 10,
            poll_interval_ms: 1000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            return Err(anyhow::anyhow!("Worker ID不能为空"));
        }

        if self.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!("最大并发任务数必须大于0"));
        }

        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("轮询间隔必须大于0"));
        }

        Ok(())
    }
}

/// 内置任务族
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Http,
    Shell,
}

/// 单个执行策略的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub contract_key: String,
    pub kind: StrategyKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    300
}

impl StrategyConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.contract_key.trim().is_empty() {
            return Err(anyhow::anyhow!("策略的contract_key不能为空"));
        }

        if self.timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "策略 {} 的超时时间必须大于0",
                self.contract_key
            ));
        }

        match self.kind {
            StrategyKind::Http => match self.url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "HTTP策略 {} 需要以http://或https://开头的url",
                        self.contract_key
                    ))
                }
            },
            StrategyKind::Shell => {
                if self.command.as_deref().map_or(true, str::is_empty) {
                    return Err(anyhow::anyhow!(
                        "Shell策略 {} 需要提供command",
                        self.contract_key
                    ));
                }
            }
        }

        Ok(())
    }
}
