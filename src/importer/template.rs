// ==========================================
// 批量导入系统 - 导入模板生成器
// ==========================================
// 职责: 生成与解析器同格式（分号分隔）的示例 CSV
// 表头: 必填字段 + 可选字段（模式顺序）；数据行: 示例值（缺失为空）
// ==========================================

use crate::domain::schema::{user_fields, FieldSchema};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::file_parser::CSV_DELIMITER;
use csv::{QuoteStyle, WriterBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct TemplateGenerator;

impl TemplateGenerator {
    /// 模板文件名: plantilla_importacion_<entity>.csv
    pub fn file_name(entity: &str) -> String {
        format!("plantilla_importacion_{}.csv", entity)
    }

    /// 生成模板内容
    ///
    /// 不加引号写出，解析器读回即为原值
    pub fn generate(
        schema: &FieldSchema,
        example: &HashMap<String, String>,
    ) -> ImporterResult<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .delimiter(CSV_DELIMITER)
            .quote_style(QuoteStyle::Never)
            .from_writer(Vec::new());

        let columns: Vec<&str> = schema.columns().collect();
        writer
            .write_record(&columns)
            .map_err(|e| ImportError::TemplateError(e.to_string()))?;

        let values: Vec<&str> = columns
            .iter()
            .map(|column| example.get(*column).map(String::as_str).unwrap_or(""))
            .collect();
        writer
            .write_record(&values)
            .map_err(|e| ImportError::TemplateError(e.to_string()))?;

        writer
            .into_inner()
            .map_err(|e| ImportError::TemplateError(e.to_string()))
    }

    /// 写出模板文件并返回路径
    pub fn write_to(
        dir: &Path,
        entity: &str,
        schema: &FieldSchema,
        example: &HashMap<String, String>,
    ) -> ImporterResult<PathBuf> {
        let bytes = Self::generate(schema, example)?;
        let path = dir.join(Self::file_name(entity));
        std::fs::write(&path, bytes)?;
        info!(path = %path.display(), "模板已生成");
        Ok(path)
    }

    /// 用户导入的示例行
    pub fn user_example() -> HashMap<String, String> {
        use user_fields::*;
        [
            (EMAIL, "usuario@centro.es"),
            (USER_TYPE, "ORIENTADOR"),
            (FIRST_NAME, "Ana"),
            (LAST_NAME, "García López"),
            (PHONE, "600123456"),
            (CENTER_ID, "1"),
            (ALLOWED_GROUPS, r#"["1A","1B"]"#),
            (SPECIALTY, ""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}
