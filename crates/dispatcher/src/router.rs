//! 路由闸门
//!
//! 按合约键决定任务交给消息队列还是回退到同步执行路径。
//! 对调用方只暴露一个布尔结果：`false` 一律表示"走回退路径"，
//! 功能未开启与传输失败的区别只体现在日志中。

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use orchestrator_core::{
    JobDescriptor, Message, MessageQueue, OrchestratorError, ToggleStore,
};

/// 单次路由的内部结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// 已发布到消息队列
    Published,
    /// 合约键未启用消息队列路由
    Disabled,
    /// 开关存储不可达
    ToggleUnavailable,
    /// 当前环境未接入消息传输
    TransportUnsupported,
    /// 发布失败
    PublishFailed,
}

impl RouteDecision {
    pub fn is_published(&self) -> bool {
        matches!(self, RouteDecision::Published)
    }
}

pub struct JobRouter {
    toggles: Arc<dyn ToggleStore>,
    message_queue: Arc<dyn MessageQueue>,
    job_queue: String,
    feature_name: String,
}

impl JobRouter {
    pub fn new(
        toggles: Arc<dyn ToggleStore>,
        message_queue: Arc<dyn MessageQueue>,
        job_queue: impl Into<String>,
        feature_name: impl Into<String>,
    ) -> Self {
        Self {
            toggles,
            message_queue,
            job_queue: job_queue.into(),
            feature_name: feature_name.into(),
        }
    }

    /// 尝试将任务交给消息队列；返回 `false` 时调用方应走回退路径
    pub async fn try_route(&self, descriptor: &JobDescriptor) -> bool {
        self.route(descriptor).await.is_published()
    }

    /// 路由并返回具体结论，从不向调用方抛出错误
    pub async fn route(&self, descriptor: &JobDescriptor) -> RouteDecision {
        let job_id = descriptor.job_id();
        let contract_key = descriptor.contract_key();

        // 每次调用都重新读取开关，不跨调用缓存
        let enabled = match self
            .toggles
            .get_enabled_contract_keys(&self.feature_name)
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    contract_key = %contract_key,
                    feature = %self.feature_name,
                    "读取功能开关失败，回退到同步路径: {e}"
                );
                return RouteDecision::ToggleUnavailable;
            }
        };

        if !enabled.iter().any(|k| k == contract_key.as_str()) {
            debug!(
                job_id = %job_id,
                contract_key = %contract_key,
                "合约键未启用消息队列路由"
            );
            return RouteDecision::Disabled;
        }

        let message = match Message::job_execution(descriptor) {
            Ok(message) => message,
            Err(e) => {
                error!(job_id = %job_id, contract_key = %contract_key, "任务消息序列化失败: {e}");
                return RouteDecision::PublishFailed;
            }
        };

        match self
            .message_queue
            .publish_message(&self.job_queue, &message)
            .await
        {
            Ok(()) => {
                info!(
                    job_id = %job_id,
                    contract_key = %contract_key,
                    message_id = %message.id,
                    queue = %self.job_queue,
                    "任务已发布到消息队列"
                );
                RouteDecision::Published
            }
            Err(OrchestratorError::NotSupported(reason)) => {
                warn!(
                    job_id = %job_id,
                    contract_key = %contract_key,
                    "当前环境未接入消息传输，回退到同步路径: {reason}"
                );
                RouteDecision::TransportUnsupported
            }
            Err(e) => {
                error!(
                    job_id = %job_id,
                    contract_key = %contract_key,
                    queue = %self.job_queue,
                    "发布任务消息失败，回退到同步路径: {e}"
                );
                RouteDecision::PublishFailed
            }
        }
    }
}
