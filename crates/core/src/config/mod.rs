//! 配置管理
//!
//! 配置加载顺序：
//! 1. 内置默认值（各配置段的 `Default` 实现）
//! 2. TOML 配置文件
//! 3. 环境变量覆盖（前缀 `ORCHESTRATOR`，层级分隔符 `__`）

pub mod models;

pub use models::*;
