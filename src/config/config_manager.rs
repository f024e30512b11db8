// ==========================================
// 批量导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)，缺省回落到内置默认值
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::import_config_trait::{ImportConfig, ImportConfigReader};
use crate::db::{configure_sqlite_connection, init_config_schema, open_sqlite_connection};
use crate::domain::schema::FieldSchema;
use crate::i18n;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（表不存在时自动创建）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new<P: AsRef<Path>>(db_path: P) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_config_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| ConfigError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_config_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    fn lock(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（先校验，再 UPSERT）
    pub fn set(&self, key: &str, value: &str) -> ConfigResult<()> {
        validate_value(key, value)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        info!(key, value, "配置已更新");
        Ok(())
    }

    /// 删除覆写，恢复默认值
    pub fn unset(&self, key: &str) -> ConfigResult<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    /// 列出 global scope 的全部配置（按 key 排序）
    pub fn entries(&self) -> ConfigResult<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取字段列表（JSON 数组）；格式错误时回落默认值
    fn get_field_list(&self, key: &str, default: &[String]) -> ConfigResult<Vec<String>> {
        match self.get(key)? {
            Some(raw) => match parse_field_list(&raw) {
                Ok(fields) => Ok(fields),
                Err(e) => {
                    warn!(config_key = key, raw_value = %raw, error = %e, "字段列表配置格式错误，使用默认值");
                    Ok(default.to_vec())
                }
            },
            None => Ok(default.to_vec()),
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_entity(&self) -> ConfigResult<String> {
        let defaults = ImportConfig::default();
        let value = self.get_config_or_default(config_keys::IMPORT_ENTITY, &defaults.entity)?;
        let value = value.trim();
        if value.is_empty() {
            Ok(defaults.entity)
        } else {
            Ok(value.to_string())
        }
    }

    async fn get_locale(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::IMPORT_LOCALE, i18n::DEFAULT_LOCALE)?;
        if i18n::is_available(&value) {
            Ok(value)
        } else {
            warn!(raw_value = %value, "不支持的语言配置，使用默认语言");
            Ok(i18n::DEFAULT_LOCALE.to_string())
        }
    }

    async fn get_field_schema(&self) -> ConfigResult<FieldSchema> {
        let defaults = FieldSchema::user_import();
        let schema = FieldSchema {
            required_fields: self
                .get_field_list(config_keys::IMPORT_REQUIRED_FIELDS, &defaults.required_fields)?,
            optional_fields: self
                .get_field_list(config_keys::IMPORT_OPTIONAL_FIELDS, &defaults.optional_fields)?,
        };
        debug!(?schema, "字段模式已加载");
        Ok(schema)
    }
}

/// 解析字段列表: 非空字符串组成的 JSON 数组
fn parse_field_list(raw: &str) -> Result<Vec<String>, String> {
    let fields: Vec<String> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err("los nombres de campo no pueden estar vacíos".to_string());
    }
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

fn validate_value(key: &str, value: &str) -> ConfigResult<()> {
    match key {
        config_keys::IMPORT_ENTITY => {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(key, "no puede estar vacío"));
            }
        }
        config_keys::IMPORT_LOCALE => {
            if !i18n::is_available(value) {
                return Err(ConfigError::invalid(
                    key,
                    format!("idioma no disponible: {}", value),
                ));
            }
        }
        config_keys::IMPORT_REQUIRED_FIELDS | config_keys::IMPORT_OPTIONAL_FIELDS => {
            parse_field_list(value).map_err(|e| ConfigError::invalid(key, e))?;
        }
        other => return Err(ConfigError::UnknownKey(other.to_string())),
    }
    Ok(())
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    pub const IMPORT_ENTITY: &str = "import.entity";
    pub const IMPORT_LOCALE: &str = "import.locale";
    pub const IMPORT_REQUIRED_FIELDS: &str = "import.required_fields"; // JSON 数组
    pub const IMPORT_OPTIONAL_FIELDS: &str = "import.optional_fields"; // JSON 数组

    pub const ALL: [&str; 4] = [
        IMPORT_ENTITY,
        IMPORT_LOCALE,
        IMPORT_REQUIRED_FIELDS,
        IMPORT_OPTIONAL_FIELDS,
    ];
}
