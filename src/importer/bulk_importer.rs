// ==========================================
// 批量导入系统 - 逐条导入器
// ==========================================
// 阶段 3: 按原始顺序逐条调用创建操作
// 红线:
// - 同一时刻只有一个 create 在执行（进度单调、后端不承受并发批量写入）
// - 单条失败只计数，不中断批次
// - succeeded + failed == total
// ==========================================

use crate::domain::import::{ImportResult, RecordOutcome, RecordStatus};
use crate::domain::record::RawRecord;
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::import_traits::RecordSink;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 待导入行（行号用于结果回溯）
#[derive(Debug, Clone, Copy)]
pub struct EligibleRow<'a> {
    pub row_number: usize,
    pub record: &'a RawRecord,
}

/// 进度百分比 = round(100 * processed / total)
pub fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64) * 100.0 / (total as f64)).round() as u8
}

// ==========================================
// BulkImporter - 逐条导入器
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkImporter;

impl BulkImporter {
    pub fn new() -> Self {
        Self
    }

    /// 执行导入
    ///
    /// # 参数
    /// - rows: 可导入行（Valid ∪ ValidWithWarnings），按原始顺序
    /// - sink: 创建操作
    /// - on_progress: 每处理一行（无论成败）回调一次百分比
    ///
    /// # 返回
    /// - Ok(ImportResult): 汇总（含逐条结果）
    /// - Err(NothingToImport): rows 为空，未做任何处理
    #[instrument(skip_all, fields(total = rows.len(), run_id))]
    pub async fn import<S, F>(
        &self,
        rows: &[EligibleRow<'_>],
        sink: &S,
        mut on_progress: F,
    ) -> ImporterResult<ImportResult>
    where
        S: RecordSink + ?Sized,
        F: FnMut(u8) + Send,
    {
        if rows.is_empty() {
            return Err(ImportError::NothingToImport);
        }

        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        let total = rows.len();
        let started_at = Utc::now();
        info!(total, "开始逐条导入");

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut outcomes = Vec::with_capacity(total);

        for (idx, row) in rows.iter().enumerate() {
            let status = match sink.create(row.record).await {
                Ok(()) => {
                    succeeded += 1;
                    debug!(row_number = row.row_number, "记录创建成功");
                    RecordStatus::Created
                }
                Err(e) => {
                    // 失败不中断批次
                    failed += 1;
                    warn!(row_number = row.row_number, error = %e, "记录创建失败");
                    RecordStatus::Failed {
                        reason: format!("{:#}", e),
                    }
                }
            };
            outcomes.push(RecordOutcome {
                row_number: row.row_number,
                status,
            });

            on_progress(progress_percent(idx + 1, total));
        }

        info!(total, succeeded, failed, "逐条导入完成");

        Ok(ImportResult {
            run_id,
            total,
            succeeded,
            failed,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

// ==========================================
// FnSink - 闭包适配的创建操作
// ==========================================
// 用途: 宿主应用以闭包形式提供 create（如 REST 调用）
pub struct FnSink<F> {
    create_fn: F,
}

impl<F> FnSink<F>
where
    F: for<'r> Fn(&'r RawRecord) -> BoxFuture<'r, anyhow::Result<()>> + Send + Sync,
{
    pub fn new(create_fn: F) -> Self {
        Self { create_fn }
    }
}

#[async_trait]
impl<F> RecordSink for FnSink<F>
where
    F: for<'r> Fn(&'r RawRecord) -> BoxFuture<'r, anyhow::Result<()>> + Send + Sync,
{
    async fn create(&self, record: &RawRecord) -> anyhow::Result<()> {
        (self.create_fn)(record).await
    }
}
