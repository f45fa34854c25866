//! Test data builders

use orchestrator_core::{JobDescriptor, JobStep};
use uuid::Uuid;

/// 构建测试用任务描述符，默认为 `{step: Import, source_id: 1, integration_id: 2, server_id: 3}`
pub struct TestDescriptorBuilder {
    contract_key: String,
    job_id: Uuid,
    step: JobStep,
    source_id: i32,
    integration_id: i32,
    server_id: i32,
    time_zone: Option<String>,
}

impl TestDescriptorBuilder {
    pub fn new(contract_key: &str) -> Self {
        Self {
            contract_key: contract_key.to_string(),
            job_id: Uuid::new_v4(),
            step: JobStep::Import,
            source_id: 1,
            integration_id: 2,
            server_id: 3,
            time_zone: None,
        }
    }

    pub fn with_job_id(mut self, job_id: Uuid) -> Self {
        self.job_id = job_id;
        self
    }

    pub fn with_step(mut self, step: JobStep) -> Self {
        self.step = step;
        self
    }

    pub fn with_ids(mut self, source_id: i32, integration_id: i32, server_id: i32) -> Self {
        self.source_id = source_id;
        self.integration_id = integration_id;
        self.server_id = server_id;
        self
    }

    pub fn with_time_zone(mut self, time_zone: &str) -> Self {
        self.time_zone = Some(time_zone.to_string());
        self
    }

    pub fn build(self) -> JobDescriptor {
        JobDescriptor::builder()
            .contract_key(self.contract_key)
            .job_id(self.job_id)
            .step(self.step)
            .source_id(self.source_id)
            .integration_id(self.integration_id)
            .server_id(self.server_id)
            .time_zone(self.time_zone)
            .build()
            .expect("test descriptor must be valid")
    }
}

pub fn descriptor(contract_key: &str) -> JobDescriptor {
    TestDescriptorBuilder::new(contract_key).build()
}
