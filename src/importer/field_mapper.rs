// ==========================================
// 批量导入系统 - 字段映射器实现
// ==========================================
// 职责: 原始行 → 类型化用户记录（导入边界的类型转换）
// 说明: 数字/枚举字段在此转换，未识别列保留在 extra
// ==========================================

use crate::domain::record::{FieldValue, RawRecord};
use crate::domain::schema::user_fields;
use crate::domain::user::{UserRecord, UserType};
use thiserror::Error;

/// 映射错误（已通过校验的行正常不会出现）
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MappingError {
    #[error("Campo obligatorio faltante: {0}")]
    MissingField(String),

    #[error("Valor inválido en {field}: {value}")]
    InvalidValue { field: String, value: String },
}

pub struct FieldMapper;

impl FieldMapper {
    pub fn map_user(&self, record: &RawRecord) -> Result<UserRecord, MappingError> {
        use user_fields::*;

        let email = self
            .get_string(record, EMAIL)
            .ok_or_else(|| MappingError::MissingField(EMAIL.to_string()))?;

        let user_type_raw = self
            .get_string(record, USER_TYPE)
            .ok_or_else(|| MappingError::MissingField(USER_TYPE.to_string()))?;
        let user_type = user_type_raw
            .parse::<UserType>()
            .map_err(|value| MappingError::InvalidValue {
                field: USER_TYPE.to_string(),
                value,
            })?;

        let center_id = match self.get_string(record, CENTER_ID) {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| MappingError::InvalidValue {
                field: CENTER_ID.to_string(),
                value: raw.clone(),
            })?),
            None => None,
        };

        let known = [
            EMAIL,
            USER_TYPE,
            FIRST_NAME,
            LAST_NAME,
            PHONE,
            CENTER_ID,
            ALLOWED_GROUPS,
            SPECIALTY,
        ];
        let extra = record
            .iter()
            .filter(|(name, _)| !known.contains(name))
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        Ok(UserRecord {
            email: email.to_lowercase(),
            user_type,
            first_name: self.get_string(record, FIRST_NAME),
            last_name: self.get_string(record, LAST_NAME),
            phone: self.get_string(record, PHONE),
            center_id,
            allowed_groups: self.get_list(record, ALLOWED_GROUPS),
            specialty: self.get_string(record, SPECIALTY),
            extra,
        })
    }

    /// 提取文本字段（空白 → None）
    fn get_string(&self, record: &RawRecord, key: &str) -> Option<String> {
        match record.get(key) {
            Some(FieldValue::Text(v)) => {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            _ => None,
        }
    }

    /// 提取数组字段；单个文本值按逗号拆分
    fn get_list(&self, record: &RawRecord, key: &str) -> Vec<String> {
        match record.get(key) {
            Some(FieldValue::List(items)) => items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(FieldValue::Text(v)) => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }
}
