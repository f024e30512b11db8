// ==========================================
// 批量导入系统 - 校验结果
// ==========================================
// 职责: 三态校验结论（有效 / 有效但有警告 / 无效）与校验报告
// 红线: 三个分类互斥且覆盖全部解析行
// ==========================================

use crate::domain::record::RawRecord;
use serde::{Deserialize, Serialize};

// ==========================================
// ValidationOutcome - 单行校验结论
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "messages", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    Valid,
    ValidWithWarnings(Vec<String>),
    Invalid(Vec<String>),
}

impl ValidationOutcome {
    /// 分类规则：有错误 → Invalid；否则有警告 → ValidWithWarnings；否则 Valid
    pub fn classify(errors: Vec<String>, warnings: Vec<String>) -> Self {
        if !errors.is_empty() {
            ValidationOutcome::Invalid(errors)
        } else if !warnings.is_empty() {
            ValidationOutcome::ValidWithWarnings(warnings)
        } else {
            ValidationOutcome::Valid
        }
    }

    pub fn is_eligible(&self) -> bool {
        !matches!(self, ValidationOutcome::Invalid(_))
    }

    pub fn messages(&self) -> &[String] {
        match self {
            ValidationOutcome::Valid => &[],
            ValidationOutcome::ValidWithWarnings(m) | ValidationOutcome::Invalid(m) => m,
        }
    }
}

// ==========================================
// ValidatedRow - 已分类的行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRow {
    pub row_number: usize, // 解析输出中的位置（从 1 开始）
    pub record: RawRecord,
    pub outcome: ValidationOutcome,
    /// 无效行同时触发的软规则警告（仅供展示）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressed_warnings: Vec<String>,
}

impl ValidatedRow {
    pub fn errors(&self) -> &[String] {
        match &self.outcome {
            ValidationOutcome::Invalid(errors) => errors,
            _ => &[],
        }
    }

    pub fn warnings(&self) -> &[String] {
        match &self.outcome {
            ValidationOutcome::ValidWithWarnings(warnings) => warnings,
            ValidationOutcome::Invalid(_) => &self.suppressed_warnings,
            ValidationOutcome::Valid => &[],
        }
    }
}

// ==========================================
// ValidationReport - 校验报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: Vec<ValidatedRow>,
    pub with_warnings: Vec<ValidatedRow>,
    pub invalid: Vec<ValidatedRow>,
}

impl ValidationReport {
    /// 按结论放入对应分类
    pub fn push(&mut self, row: ValidatedRow) {
        match row.outcome {
            ValidationOutcome::Valid => self.valid.push(row),
            ValidationOutcome::ValidWithWarnings(_) => self.with_warnings.push(row),
            ValidationOutcome::Invalid(_) => self.invalid.push(row),
        }
    }

    pub fn total(&self) -> usize {
        self.valid.len() + self.with_warnings.len() + self.invalid.len()
    }

    pub fn eligible_count(&self) -> usize {
        self.valid.len() + self.with_warnings.len()
    }

    pub fn is_importable(&self) -> bool {
        self.eligible_count() > 0
    }

    /// 可导入行（Valid ∪ ValidWithWarnings），按原始行号排序
    pub fn eligible(&self) -> Vec<&ValidatedRow> {
        let mut rows: Vec<&ValidatedRow> =
            self.valid.iter().chain(self.with_warnings.iter()).collect();
        rows.sort_by_key(|row| row.row_number);
        rows
    }

    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            total: self.total(),
            valid: self.valid.len(),
            with_warnings: self.with_warnings.len(),
            invalid: self.invalid.len(),
        }
    }
}

/// 预览界面用的计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub valid: usize,
    pub with_warnings: usize,
    pub invalid: usize,
}
