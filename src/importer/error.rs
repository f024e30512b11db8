// ==========================================
// 批量导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级校验错误不是 Err，而是 ValidatedRow 中的诊断信息
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 输入错误（整次运行中止）=====
    #[error("Formato de archivo no soportado: {0} (solo .csv, .json, .xlsx, .xls)")]
    UnsupportedFormat(String),

    #[error("Contenido de archivo mal formado ({format}): {message}")]
    MalformedInput { format: String, message: String },

    #[error("Error al leer el archivo: {0}")]
    FileReadError(String),

    // ===== 管道误用 =====
    #[error("No hay registros válidos para importar")]
    NothingToImport,

    #[error("Transición no permitida: {action} en estado {from}")]
    InvalidTransition { from: String, action: String },

    #[error("El pipeline se abrió solo para validar; no puede importar")]
    ReviewOnly,

    // ===== 模板 =====
    #[error("Error al generar la plantilla: {0}")]
    TemplateError(String),
}

impl ImportError {
    pub fn malformed(format: impl Into<String>, message: impl ToString) -> Self {
        ImportError::MalformedInput {
            format: format.into(),
            message: message.to_string(),
        }
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::malformed("csv", err)
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::malformed("excel", err)
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::malformed("json", err)
    }
}

/// Result 类型别名
pub type ImporterResult<T> = Result<T, ImportError>;
