use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OrchestratorError, OrchestratorResult};

/// 合约键：决定由哪个执行策略运行任务
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractKey(String);

impl ContractKey {
    pub fn new(key: impl Into<String>) -> OrchestratorResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(OrchestratorError::InvalidDescriptor(
                "contract_key不能为空".to_string(),
            ));
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ContractKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContractKey {
    type Error = OrchestratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ContractKey {
    type Error = OrchestratorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContractKey> for String {
    fn from(key: ContractKey) -> Self {
        key.0
    }
}

/// 任务阶段标识，随任务携带，对调度器不透明
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum JobStep {
    #[default]
    Start,
    Import,
    Process,
    Complete,
    Retry,
}

impl JobStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStep::Start => "Start",
            JobStep::Import => "Import",
            JobStep::Process => "Process",
            JobStep::Complete => "Complete",
            JobStep::Retry => "Retry",
        }
    }
}

impl fmt::Display for JobStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStep {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Start" => Ok(JobStep::Start),
            "Import" => Ok(JobStep::Import),
            "Process" => Ok(JobStep::Process),
            "Complete" => Ok(JobStep::Complete),
            "Retry" => Ok(JobStep::Retry),
            other => Err(OrchestratorError::InvalidDescriptor(format!(
                "未知的任务阶段: {other}"
            ))),
        }
    }
}

/// 任务描述符
///
/// 由触发方构造，构造后不可变。所有必填字段在 [`JobDescriptorBuilder::build`]
/// 中校验，下游组件不会修补或补全缺失字段。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    contract_key: ContractKey,
    job_id: Uuid,
    step: JobStep,
    source_id: i32,
    integration_id: i32,
    server_id: i32,
    time_zone: Option<String>,
}

impl JobDescriptor {
    pub fn builder() -> JobDescriptorBuilder {
        JobDescriptorBuilder::default()
    }

    pub fn contract_key(&self) -> &ContractKey {
        &self.contract_key
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn step(&self) -> JobStep {
        self.step
    }

    pub fn source_id(&self) -> i32 {
        self.source_id
    }

    pub fn integration_id(&self) -> i32 {
        self.integration_id
    }

    pub fn server_id(&self) -> i32 {
        self.server_id
    }

    pub fn time_zone(&self) -> Option<&str> {
        self.time_zone.as_deref()
    }

    /// 为重试生成一个新的执行单元：新的 job_id，阶段为 Retry，路由键保持不变
    pub fn retry_attempt(&self) -> JobDescriptor {
        JobDescriptor {
            job_id: Uuid::new_v4(),
            step: JobStep::Retry,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobDescriptorBuilder {
    contract_key: Option<String>,
    job_id: Option<Uuid>,
    step: JobStep,
    source_id: Option<i32>,
    integration_id: Option<i32>,
    server_id: Option<i32>,
    time_zone: Option<String>,
}

impl JobDescriptorBuilder {
    pub fn contract_key(mut self, contract_key: impl Into<String>) -> Self {
        self.contract_key = Some(contract_key.into());
        self
    }

    pub fn job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn step(mut self, step: JobStep) -> Self {
        self.step = step;
        self
    }

    pub fn source_id(mut self, source_id: i32) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn integration_id(mut self, integration_id: i32) -> Self {
        self.integration_id = Some(integration_id);
        self
    }

    pub fn server_id(mut self, server_id: i32) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn time_zone(mut self, time_zone: Option<String>) -> Self {
        self.time_zone = time_zone;
        self
    }

    /// 构建描述符，缺少必填字段时返回 `InvalidDescriptor`
    pub fn build(self) -> OrchestratorResult<JobDescriptor> {
        let contract_key = ContractKey::new(self.contract_key.ok_or_else(|| {
            OrchestratorError::InvalidDescriptor("缺少contract_key".to_string())
        })?)?;
        let source_id = required(self.source_id, "source_id")?;
        let integration_id = required(self.integration_id, "integration_id")?;
        let server_id = required(self.server_id, "server_id")?;

        Ok(JobDescriptor {
            contract_key,
            job_id: self.job_id.unwrap_or_else(Uuid::new_v4),
            step: self.step,
            source_id,
            integration_id,
            server_id,
            time_zone: self.time_zone,
        })
    }
}

fn required(value: Option<i32>, field: &str) -> OrchestratorResult<i32> {
    value.ok_or_else(|| OrchestratorError::InvalidDescriptor(format!("缺少{field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> JobDescriptorBuilder {
        JobDescriptor::builder()
            .contract_key("X")
            .step(JobStep::Import)
            .source_id(1)
            .integration_id(2)
            .server_id(3)
    }

    #[test]
    fn test_build_descriptor() {
        let job_id = Uuid::new_v4();
        let descriptor = builder().job_id(job_id).build().unwrap();

        assert_eq!(descriptor.contract_key().as_str(), "X");
        assert_eq!(descriptor.job_id(), job_id);
        assert_eq!(descriptor.step(), JobStep::Import);
        assert_eq!(descriptor.source_id(), 1);
        assert_eq!(descriptor.integration_id(), 2);
        assert_eq!(descriptor.server_id(), 3);
        assert_eq!(descriptor.time_zone(), None);
    }

    #[test]
    fn test_missing_contract_key_is_construction_error() {
        let result = JobDescriptor::builder()
            .source_id(1)
            .integration_id(2)
            .server_id(3)
            .build();
        assert!(matches!(result, Err(OrchestratorError::InvalidDescriptor(_))));

        let result = builder().contract_key("   ").build();
        assert!(matches!(result, Err(OrchestratorError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_missing_routing_keys() {
        let result = JobDescriptor::builder()
            .contract_key("X")
            .source_id(1)
            .server_id(3)
            .build();
        assert!(matches!(result, Err(OrchestratorError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_retry_attempt_keeps_routing_keys() {
        let descriptor = builder()
            .time_zone(Some("Europe/Berlin".to_string()))
            .build()
            .unwrap();
        let retry = descriptor.retry_attempt();

        assert_ne!(retry.job_id(), descriptor.job_id());
        assert_eq!(retry.step(), JobStep::Retry);
        assert_eq!(retry.contract_key(), descriptor.contract_key());
        assert_eq!(retry.source_id(), 1);
        assert_eq!(retry.integration_id(), 2);
        assert_eq!(retry.server_id(), 3);
        assert_eq!(retry.time_zone(), Some("Europe/Berlin"));
    }

    #[test]
    fn test_job_step_names() {
        assert_eq!("Import".parse::<JobStep>().unwrap(), JobStep::Import);
        assert_eq!(JobStep::Process.to_string(), "Process");
        assert!("import".parse::<JobStep>().is_err());
    }
}
