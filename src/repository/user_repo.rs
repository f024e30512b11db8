// ==========================================
// 批量导入系统 - 用户数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑（校验在 Validator，类型转换在 FieldMapper）
// 用途: 作为导入管道的 RecordSink，一条记录 = 一次 INSERT
// ==========================================

use crate::db::{init_users_schema, open_sqlite_connection};
use crate::domain::record::{FieldValue, RawRecord};
use crate::domain::user::{UserRecord, UserType};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::import_traits::RecordSink;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SELECT_COLUMNS: &str = "email, user_type, first_name, last_name, phone, center_id, \
     allowed_groups, specialty, extra_json";

// ==========================================
// UserRepository - 用户仓储
// ==========================================
/// 用户仓储
/// 职责: 管理 users 表的插入与查询
pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    /// 打开数据库（表不存在时自动创建）
    pub fn new<P: AsRef<Path>>(db_path: P) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_users_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入用户，返回 user_id
    ///
    /// # 错误
    /// - UniqueConstraintViolation: email 已存在
    pub fn insert(&self, user: &UserRecord) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let result = conn.execute(
            r#"
            INSERT INTO users (
                email, user_type, first_name, last_name, phone, center_id,
                allowed_groups, specialty, extra_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                user.email,
                user.user_type.as_str(),
                user.first_name,
                user.last_name,
                user.phone,
                user.center_id,
                serde_json::to_string(&user.allowed_groups)?,
                user.specialty,
                serde_json::to_string(&user.extra)?,
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) => match RepositoryError::from(e) {
                RepositoryError::UniqueConstraintViolation(_) => Err(
                    RepositoryError::UniqueConstraintViolation(format!(
                        "el email {} ya está registrado",
                        user.email
                    )),
                ),
                other => Err(other),
            },
        }
    }

    /// 按 email 查询（大小写不敏感）
    pub fn find_by_email(&self, email: &str) -> RepositoryResult<Option<UserRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM users WHERE email = ?1",
            SELECT_COLUMNS
        );
        let row = conn
            .query_row(&sql, params![email.trim().to_lowercase()], UserRow::from_row)
            .optional()?;
        row.map(UserRow::into_record).transpose()
    }

    /// 全部用户（按插入顺序）
    pub fn list_all(&self) -> RepositoryResult<Vec<UserRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM users ORDER BY user_id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], UserRow::from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.into_record()?);
        }
        Ok(users)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl RecordSink for UserRepository {
    async fn create(&self, record: &RawRecord) -> anyhow::Result<()> {
        let user = FieldMapper.map_user(record)?;
        let user_id = self.insert(&user)?;
        debug!(user_id, email = %user.email, "用户已创建");
        Ok(())
    }
}

// ==========================================
// UserRow - 数据库行（未转换）
// ==========================================
struct UserRow {
    email: String,
    user_type: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    center_id: Option<i64>,
    allowed_groups: String,
    specialty: Option<String>,
    extra_json: String,
}

impl UserRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            email: row.get(0)?,
            user_type: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            phone: row.get(4)?,
            center_id: row.get(5)?,
            allowed_groups: row.get(6)?,
            specialty: row.get(7)?,
            extra_json: row.get(8)?,
        })
    }

    fn into_record(self) -> RepositoryResult<UserRecord> {
        let user_type = self
            .user_type
            .parse::<UserType>()
            .map_err(|value| RepositoryError::FieldValueError {
                field: "user_type".to_string(),
                message: value,
            })?;
        let allowed_groups: Vec<String> = serde_json::from_str(&self.allowed_groups)?;
        let extra: IndexMap<String, FieldValue> = serde_json::from_str(&self.extra_json)?;

        Ok(UserRecord {
            email: self.email,
            user_type,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            center_id: self.center_id,
            allowed_groups,
            specialty: self.specialty,
            extra,
        })
    }
}
