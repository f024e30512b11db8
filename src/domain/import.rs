// ==========================================
// 批量导入系统 - 导入结果
// ==========================================
// 红线: succeeded + failed == total（即使每条创建都失败）
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RecordStatus / RecordOutcome - 单条记录结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Created,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub row_number: usize,
    #[serde(flatten)]
    pub status: RecordStatus,
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RecordStatus::Created)
    }
}

// ==========================================
// ImportResult - 一次导入运行的汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub run_id: String, // 运行 ID（UUID）
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<RecordOutcome>, // 处理顺序
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportResult {
    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn is_consistent(&self) -> bool {
        self.succeeded + self.failed == self.total && self.outcomes.len() == self.total
    }
}
