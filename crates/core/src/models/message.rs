use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{JobDescriptor, JobStep};
use crate::{OrchestratorError, OrchestratorResult};

/// 任务执行消息的线上格式，字段名与生产者保持一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMessage {
    pub contract_key: String,
    pub job_guid: Uuid,
    pub step: JobStep,
    pub source_id: i32,
    pub integration_id: i32,
    pub server_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone_string: Option<String>,
}

impl From<&JobDescriptor> for JobMessage {
    fn from(descriptor: &JobDescriptor) -> Self {
        Self {
            contract_key: descriptor.contract_key().to_string(),
            job_guid: descriptor.job_id(),
            step: descriptor.step(),
            source_id: descriptor.source_id(),
            integration_id: descriptor.integration_id(),
            server_id: descriptor.server_id(),
            time_zone_string: descriptor.time_zone().map(str::to_string),
        }
    }
}

impl TryFrom<JobMessage> for JobDescriptor {
    type Error = OrchestratorError;

    fn try_from(message: JobMessage) -> Result<Self, Self::Error> {
        JobDescriptor::builder()
            .contract_key(message.contract_key)
            .job_id(message.job_guid)
            .step(message.step)
            .source_id(message.source_id)
            .integration_id(message.integration_id)
            .server_id(message.server_id)
            .time_zone(message.time_zone_string)
            .build()
    }
}

/// 传输层消息：消息体即 [`JobMessage`] 的 JSON 编码
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub body: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub redelivered: bool,
    pub correlation_id: Option<String>,
}

impl Message {
    /// 将任务描述符封装为任务执行消息
    pub fn job_execution(descriptor: &JobDescriptor) -> OrchestratorResult<Self> {
        let body = serde_json::to_vec(&JobMessage::from(descriptor))?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            body,
            timestamp: Utc::now(),
            redelivered: false,
            correlation_id: Some(descriptor.job_id().to_string()),
        })
    }

    pub fn from_body(id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            body,
            timestamp: Utc::now(),
            redelivered: false,
            correlation_id: None,
        }
    }

    pub fn with_redelivered(mut self, redelivered: bool) -> Self {
        self.redelivered = redelivered;
        self
    }

    /// 解码消息体；格式错误或必填字段缺失都视为无法解析的消息
    pub fn decode_job(&self) -> OrchestratorResult<JobDescriptor> {
        let envelope: JobMessage =
            serde_json::from_slice(&self.body).map_err(|e| OrchestratorError::MalformedMessage {
                message_id: self.id.clone(),
                reason: e.to_string(),
            })?;

        JobDescriptor::try_from(envelope).map_err(|e| OrchestratorError::MalformedMessage {
            message_id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> JobDescriptor {
        JobDescriptor::builder()
            .contract_key("X")
            .step(JobStep::Import)
            .source_id(1)
            .integration_id(2)
            .server_id(3)
            .build()
            .unwrap()
    }

    #[test]
    fn test_wire_field_names() {
        let descriptor = JobDescriptor::builder()
            .contract_key("X")
            .step(JobStep::Import)
            .source_id(1)
            .integration_id(2)
            .server_id(3)
            .time_zone(Some("America/New_York".to_string()))
            .build()
            .unwrap();
        let value = serde_json::to_value(JobMessage::from(&descriptor)).unwrap();

        assert_eq!(
            value,
            json!({
                "contractKey": "X",
                "jobGuid": descriptor.job_id().to_string(),
                "step": "Import",
                "sourceId": 1,
                "integrationId": 2,
                "serverId": 3,
                "timeZoneString": "America/New_York",
            })
        );
    }

    #[test]
    fn test_decode_job_execution_message() {
        let descriptor = descriptor();
        let message = Message::job_execution(&descriptor).unwrap();

        assert_eq!(message.correlation_id, Some(descriptor.job_id().to_string()));
        assert_eq!(message.decode_job().unwrap(), descriptor);
    }

    #[test]
    fn test_decode_without_time_zone() {
        let body = json!({
            "contractKey": "X",
            "jobGuid": "6f1c1d36-7a0e-4a5b-9d3c-2f5a0c1e9b11",
            "step": "Process",
            "sourceId": 10,
            "integrationId": 20,
            "serverId": 30,
        });
        let message = Message::from_body("m-1", serde_json::to_vec(&body).unwrap());
        let descriptor = message.decode_job().unwrap();

        assert_eq!(descriptor.step(), JobStep::Process);
        assert_eq!(descriptor.time_zone(), None);
    }

    #[test]
    fn test_decode_malformed_message() {
        let message = Message::from_body("m-2", b"not json".to_vec());
        assert!(matches!(
            message.decode_job(),
            Err(OrchestratorError::MalformedMessage { message_id, .. }) if message_id == "m-2"
        ));

        let body = json!({
            "contractKey": "",
            "jobGuid": "6f1c1d36-7a0e-4a5b-9d3c-2f5a0c1e9b11",
            "step": "Start",
            "sourceId": 1,
            "integrationId": 2,
            "serverId": 3,
        });
        let message = Message::from_body("m-3", serde_json::to_vec(&body).unwrap());
        assert!(matches!(
            message.decode_job(),
            Err(OrchestratorError::MalformedMessage { .. })
        ));
    }
}
