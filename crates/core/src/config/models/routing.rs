use serde::{Deserialize, Serialize};

/// 开关数据来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToggleSource {
    /// 使用配置中的 `enabled_contract_keys`
    #[default]
    Static,
    /// 每次路由时重新读取 `toggle_file`
    File,
}

/// Routing gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub feature_name: String,
    pub toggle_source: ToggleSource,
    pub enabled_contract_keys: Vec<String>,
    pub toggle_file: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            feature_name: "JobBrokerRouting".to_string(),
            toggle_source: ToggleSource::Static,
            enabled_contract_keys: Vec::new(),
            toggle_file: None,
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feature_name.trim().is_empty() {
            return Err(anyhow::anyhow!("路由功能开关名称不能为空"));
        }

        if self.toggle_source == ToggleSource::File
            && self.toggle_file.as_deref().map_or(true, str::is_empty)
        {
            return Err(anyhow::anyhow!("toggle_source为file时必须提供toggle_file"));
        }

        if self.enabled_contract_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(anyhow::anyhow!("enabled_contract_keys中不能包含空的合约键"));
        }

        Ok(())
    }
}
