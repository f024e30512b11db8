// ==========================================
// 批量导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口 + 内置默认配置
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::error::ConfigResult;
use crate::domain::schema::FieldSchema;
use crate::i18n::DEFAULT_LOCALE;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 默认导入实体（模板文件名后缀）
pub const DEFAULT_ENTITY: &str = "usuarios";

// ==========================================
// ImportConfig - 一次导入运行的配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub entity: String,
    pub locale: String,
    pub schema: FieldSchema,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            entity: DEFAULT_ENTITY.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            schema: FieldSchema::user_import(),
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者:
// - ImportConfig（内存中的固定配置）
// - ConfigManager（从 config_kv 表读取，缺省回落到默认值）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 导入实体名
    ///
    /// # 默认值
    /// - usuarios
    async fn get_entity(&self) -> ConfigResult<String>;

    /// 诊断信息语言
    ///
    /// # 默认值
    /// - es
    async fn get_locale(&self) -> ConfigResult<String>;

    /// 字段模式（必填 + 可选）
    ///
    /// # 默认值
    /// - FieldSchema::user_import()
    async fn get_field_schema(&self) -> ConfigResult<FieldSchema>;

    /// 组装完整导入配置
    async fn load_import_config(&self) -> ConfigResult<ImportConfig> {
        Ok(ImportConfig {
            entity: self.get_entity().await?,
            locale: self.get_locale().await?,
            schema: self.get_field_schema().await?,
        })
    }
}

#[async_trait]
impl ImportConfigReader for ImportConfig {
    async fn get_entity(&self) -> ConfigResult<String> {
        Ok(self.entity.clone())
    }

    async fn get_locale(&self) -> ConfigResult<String> {
        Ok(self.locale.clone())
    }

    async fn get_field_schema(&self) -> ConfigResult<FieldSchema> {
        Ok(self.schema.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_config_reader() {
        let config = ImportConfig {
            locale: "en".to_string(),
            ..ImportConfig::default()
        };

        let loaded = config.load_import_config().await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.entity, "usuarios");
        assert_eq!(loaded.schema.required_fields, vec!["email", "user_type"]);
    }
}
