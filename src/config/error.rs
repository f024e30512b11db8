// ==========================================
// 批量导入系统 - 配置层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error de almacenamiento de configuración: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("No se pudo obtener el bloqueo de configuración: {0}")]
    LockError(String),

    #[error("Valor inválido para {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Clave de configuración desconocida: {0}")]
    UnknownKey(String),
}

impl ConfigError {
    pub fn invalid(key: &str, message: impl ToString) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
