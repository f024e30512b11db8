// ==========================================
// 批量导入系统 - 用户领域类型
// ==========================================
// 职责: 用户类型（判别字段）与类型化的用户记录
// ==========================================

use crate::domain::record::FieldValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// UserType - 用户类型
// ==========================================
// 序列化格式: SCREAMING_SNAKE_CASE（与后端一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Administrador,
    Orientador,
    Profesor,
    Examinador,
    Clinico,
}

impl UserType {
    pub const ALL: [UserType; 5] = [
        UserType::Administrador,
        UserType::Orientador,
        UserType::Profesor,
        UserType::Examinador,
        UserType::Clinico,
    ];

    /// 严格匹配后端的规范写法（区分大小写，不去空白）
    pub fn from_canonical(value: &str) -> Option<UserType> {
        UserType::ALL.iter().copied().find(|t| t.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Administrador => "ADMINISTRADOR",
            UserType::Orientador => "ORIENTADOR",
            UserType::Profesor => "PROFESOR",
            UserType::Examinador => "EXAMINADOR",
            UserType::Clinico => "CLINICO",
        }
    }

    /// 该类型是否应分配所属中心
    pub fn expects_center(&self) -> bool {
        matches!(self, UserType::Orientador | UserType::Profesor)
    }

    /// 该类型是否应配置允许访问的分组
    pub fn expects_groups(&self) -> bool {
        matches!(self, UserType::Examinador)
    }

    /// 该类型是否应带有专业类别
    pub fn expects_specialty(&self) -> bool {
        matches!(self, UserType::Clinico)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        UserType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| s.to_string())
    }
}

// ==========================================
// UserRecord - 类型化用户记录
// ==========================================
// 用途: 创建操作的输入（由 FieldMapper 在导入边界构造）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub user_type: UserType,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub center_id: Option<i64>,
    pub allowed_groups: Vec<String>,
    pub specialty: Option<String>,
    /// 未识别的列，原样保留
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, FieldValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_parse_case_insensitive() {
        assert_eq!("orientador".parse::<UserType>(), Ok(UserType::Orientador));
        assert_eq!(" CLINICO ".parse::<UserType>(), Ok(UserType::Clinico));
        assert_eq!("ALUMNO".parse::<UserType>(), Err("ALUMNO".to_string()));
    }

    #[test]
    fn test_canonical_form_is_exact() {
        assert_eq!(UserType::from_canonical("PROFESOR"), Some(UserType::Profesor));
        assert_eq!(UserType::from_canonical("profesor"), None);
        assert_eq!(UserType::from_canonical(" PROFESOR"), None);
    }

    #[test]
    fn test_role_expectations() {
        assert!(UserType::Orientador.expects_center());
        assert!(UserType::Profesor.expects_center());
        assert!(UserType::Examinador.expects_groups());
        assert!(UserType::Clinico.expects_specialty());
        assert!(!UserType::Administrador.expects_center());
        assert!(!UserType::Administrador.expects_groups());
        assert!(!UserType::Administrador.expects_specialty());
    }

    #[test]
    fn test_user_type_serde() {
        let json = serde_json::to_string(&UserType::Examinador).unwrap();
        assert_eq!(json, "\"EXAMINADOR\"");
    }
}
