use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use orchestrator_core::{
    config::models::{RoutingConfig, ToggleSource},
    OrchestratorError, OrchestratorResult, ToggleStore,
};

/// 内存中的功能开关，可在运行时更新
#[derive(Debug, Default)]
pub struct StaticToggleStore {
    features: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticToggleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature(feature_name: impl Into<String>, keys: Vec<String>) -> Self {
        let store = Self::new();
        store.set_enabled(feature_name, keys);
        store
    }

    /// 替换某个功能启用的合约键
    pub fn set_enabled(&self, feature_name: impl Into<String>, keys: Vec<String>) {
        match self.features.write() {
            Ok(mut features) => {
                features.insert(feature_name.into(), keys);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(feature_name.into(), keys);
            }
        }
    }
}

#[async_trait]
impl ToggleStore for StaticToggleStore {
    async fn get_enabled_contract_keys(
        &self,
        feature_name: &str,
    ) -> OrchestratorResult<Vec<String>> {
        let features = self
            .features
            .read()
            .map_err(|_| OrchestratorError::ToggleStore("功能开关锁已中毒".to_string()))?;
        Ok(features.get(feature_name).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ToggleFile {
    #[serde(default)]
    features: HashMap<String, Vec<String>>,
}

/// 基于TOML文件的功能开关
///
/// 文件格式：
///
/// ```toml
/// [features]
/// JobBrokerRouting = ["X", "Y"]
/// ```
///
/// 每次调用都会重新读取文件。
#[derive(Debug, Clone)]
pub struct FileToggleStore {
    path: PathBuf,
}

impl FileToggleStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ToggleStore for FileToggleStore {
    async fn get_enabled_contract_keys(
        &self,
        feature_name: &str,
    ) -> OrchestratorResult<Vec<String>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            OrchestratorError::ToggleStore(format!(
                "读取功能开关文件 {} 失败: {e}",
                self.path.display()
            ))
        })?;

        let file: ToggleFile = toml::from_str(&content).map_err(|e| {
            OrchestratorError::ToggleStore(format!(
                "解析功能开关文件 {} 失败: {e}",
                self.path.display()
            ))
        })?;

        let keys = file.features.get(feature_name).cloned().unwrap_or_default();
        debug!(feature = feature_name, enabled = keys.len(), "读取功能开关文件");
        Ok(keys)
    }
}

/// 按路由配置创建功能开关存储
pub fn toggle_store_from_config(config: &RoutingConfig) -> OrchestratorResult<Arc<dyn ToggleStore>> {
    match config.toggle_source {
        ToggleSource::Static => Ok(Arc::new(StaticToggleStore::with_feature(
            config.feature_name.clone(),
            config.enabled_contract_keys.clone(),
        ))),
        ToggleSource::File => {
            let path = config.toggle_file.as_deref().ok_or_else(|| {
                OrchestratorError::Configuration("toggle_source为file时必须提供toggle_file".to_string())
            })?;
            Ok(Arc::new(FileToggleStore::new(path)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn write_toggles(file: &NamedTempFile, content: &str) {
        std::fs::write(file.path(), content).unwrap();
    }

    #[tokio::test]
    async fn test_static_store_updates_at_runtime() {
        let store = StaticToggleStore::with_feature("JobBrokerRouting", vec!["X".to_string()]);
        assert_eq!(
            store.get_enabled_contract_keys("JobBrokerRouting").await.unwrap(),
            vec!["X"]
        );

        store.set_enabled("JobBrokerRouting", vec![]);
        assert!(store
            .get_enabled_contract_keys("JobBrokerRouting")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_static_store_unknown_feature_is_empty() {
        let store = StaticToggleStore::new();
        assert!(store
            .get_enabled_contract_keys("Missing")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_file_store_rereads_on_every_call() {
        let file = NamedTempFile::new().unwrap();
        write_toggles(&file, "[features]\nJobBrokerRouting = [\"X\"]\n");
        let store = FileToggleStore::new(file.path());

        assert_eq!(
            store.get_enabled_contract_keys("JobBrokerRouting").await.unwrap(),
            vec!["X"]
        );

        write_toggles(&file, "[features]\nJobBrokerRouting = [\"Y\", \"Z\"]\n");
        assert_eq!(
            store.get_enabled_contract_keys("JobBrokerRouting").await.unwrap(),
            vec!["Y", "Z"]
        );
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_error() {
        let store = FileToggleStore::new("/nonexistent/toggles.toml");
        let result = store.get_enabled_contract_keys("JobBrokerRouting").await;
        assert!(matches!(result, Err(OrchestratorError::ToggleStore(_))));
    }

    #[tokio::test]
    async fn test_file_store_invalid_toml_is_error() {
        let file = NamedTempFile::new().unwrap();
        write_toggles(&file, "[features\n");
        let store = FileToggleStore::new(file.path());

        let result = store.get_enabled_contract_keys("JobBrokerRouting").await;
        assert!(matches!(result, Err(OrchestratorError::ToggleStore(_))));
    }

    #[tokio::test]
    async fn test_store_from_config() {
        let config = RoutingConfig {
            enabled_contract_keys: vec!["X".to_string()],
            ..Default::default()
        };
        let store = toggle_store_from_config(&config).unwrap();
        assert_eq!(
            store
                .get_enabled_contract_keys(&config.feature_name)
                .await
                .unwrap(),
            vec!["X"]
        );
    }
}
