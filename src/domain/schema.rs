// ==========================================
// 批量导入系统 - 字段模式
// ==========================================
// 职责: 描述导入文件的必填/可选字段（由调用方配置）
// ==========================================

use serde::{Deserialize, Serialize};

// 用户导入字段名
pub mod user_fields {
    pub const EMAIL: &str = "email";
    pub const USER_TYPE: &str = "user_type";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const PHONE: &str = "phone";
    pub const CENTER_ID: &str = "center_id";
    pub const ALLOWED_GROUPS: &str = "allowed_groups";
    pub const SPECIALTY: &str = "specialty";
}

// ==========================================
// FieldSchema - 字段模式
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
}

impl FieldSchema {
    pub fn new<R, O, S1, S2>(required: R, optional: O) -> Self
    where
        R: IntoIterator<Item = S1>,
        O: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            required_fields: required.into_iter().map(Into::into).collect(),
            optional_fields: optional.into_iter().map(Into::into).collect(),
        }
    }

    /// 用户导入的默认模式
    pub fn user_import() -> Self {
        use user_fields::*;
        Self::new(
            [EMAIL, USER_TYPE],
            [
                FIRST_NAME,
                LAST_NAME,
                PHONE,
                CENTER_ID,
                ALLOWED_GROUPS,
                SPECIALTY,
            ],
        )
    }

    /// 模板列顺序：必填在前，可选在后
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.required_fields
            .iter()
            .chain(self.optional_fields.iter())
            .map(String::as_str)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required_fields.iter().any(|f| f == field)
    }

    pub fn is_known(&self, field: &str) -> bool {
        self.columns().any(|f| f == field)
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::user_import()
    }
}
