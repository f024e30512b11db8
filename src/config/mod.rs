// ==========================================
// 批量导入系统 - 配置层
// ==========================================
// 职责: 导入配置（实体、语言、字段模式），支持覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod error;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use error::{ConfigError, ConfigResult};
pub use import_config_trait::{ImportConfig, ImportConfigReader, DEFAULT_ENTITY};
