// ==========================================
// 批量导入系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 消息会作为逐条导入失败原因展示给操作员
// ==========================================

use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("No se pudo obtener el bloqueo de la base de datos: {0}")]
    LockError(String),

    #[error("Error en la consulta a la base de datos: {0}")]
    DatabaseQueryError(String),

    #[error("Violación de restricción única: {0}")]
    UniqueConstraintViolation(String),

    // ===== 数据质量错误 =====
    #[error("Valor de campo erróneo (campo={field}): {message}")]
    FieldValueError { field: String, message: String },
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::FieldValueError {
            field: "json".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
