use thiserror::Error;
use uuid::Uuid;

/// 编排核心错误类型定义
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("未注册的执行策略: {contract_key}")]
    StrategyNotFound { contract_key: String },

    #[error("重复注册的执行策略: {contract_key}")]
    DuplicateStrategy { contract_key: String },

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("无效的任务描述符: {0}")]
    InvalidDescriptor(String),

    #[error("开关存储错误: {0}")]
    ToggleStore(String),

    #[error("消息队列错误: {0}")]
    MessageQueue(String),

    #[error("当前环境不支持该操作: {0}")]
    NotSupported(String),

    #[error("任务初始化失败: job_id={job_id}, {message}")]
    JobInitialization { job_id: Uuid, message: String },

    #[error("任务阶段 {phase} 执行失败: {message}")]
    JobPhase { phase: String, message: String },

    #[error("任务执行失败: job_id={job_id}, contract_key={contract_key}")]
    JobFailed {
        job_id: Uuid,
        contract_key: String,
        #[source]
        source: Box<OrchestratorError>,
    },

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("无法解析的消息: message_id={message_id}, {reason}")]
    MalformedMessage { message_id: String, reason: String },

    #[error("任务已取消")]
    Cancelled,

    #[error("HTTP错误: {0}")]
    Http(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// 配置缺陷：部署或注册问题，不会自动重试
    pub fn is_configuration_defect(&self) -> bool {
        matches!(
            self,
            OrchestratorError::StrategyNotFound { .. }
                | OrchestratorError::DuplicateStrategy { .. }
                | OrchestratorError::Configuration(_)
                | OrchestratorError::InvalidDescriptor(_)
        )
    }

    /// 是否为取消信号（包括被包装在 JobFailed 中的情况）
    pub fn is_cancelled(&self) -> bool {
        match self {
            OrchestratorError::Cancelled => true,
            OrchestratorError::JobFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    pub fn phase(phase: impl std::fmt::Display, message: impl Into<String>) -> Self {
        OrchestratorError::JobPhase {
            phase: phase.to_string(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        OrchestratorError::Serialization(e.to_string())
    }
}

/// 统一的Result类型
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_defects() {
        assert!(OrchestratorError::StrategyNotFound {
            contract_key: "X".to_string()
        }
        .is_configuration_defect());
        assert!(OrchestratorError::DuplicateStrategy {
            contract_key: "X".to_string()
        }
        .is_configuration_defect());
        assert!(!OrchestratorError::MessageQueue("down".to_string()).is_configuration_defect());
        assert!(!OrchestratorError::Cancelled.is_configuration_defect());
    }

    #[test]
    fn test_cancelled_seen_through_job_failed() {
        let err = OrchestratorError::JobFailed {
            job_id: Uuid::new_v4(),
            contract_key: "X".to_string(),
            source: Box::new(OrchestratorError::Cancelled),
        };
        assert!(err.is_cancelled());

        let err = OrchestratorError::JobFailed {
            job_id: Uuid::new_v4(),
            contract_key: "X".to_string(),
            source: Box::new(OrchestratorError::phase("Execute", "boom")),
        };
        assert!(!err.is_cancelled());
    }
}
