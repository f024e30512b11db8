// ==========================================
// 批量导入系统 - 领域模型层
// ==========================================
// 职责: 定义行记录、字段模式、校验结论、导入结果
// 红线: 不含解析/数据访问逻辑
// ==========================================

pub mod import;
pub mod record;
pub mod schema;
pub mod user;
pub mod validation;

// 重导出核心类型
pub use import::{ImportResult, RecordOutcome, RecordStatus};
pub use record::{FieldValue, RawRecord};
pub use schema::{user_fields, FieldSchema};
pub use user::{UserRecord, UserType};
pub use validation::{ValidatedRow, ValidationOutcome, ValidationReport, ValidationSummary};
