// ==========================================
// 批量导入系统 - 导入管道控制器
// ==========================================
// 流程: Idle → Uploading → Validating → ReviewingResults → Importing → Complete
// 红线:
// - 状态严格线性；唯一回退是操作员 reset（ReviewingResults/Complete → Idle）
// - 每个状态只携带在该状态有效的产物（评审快照 / 导入结果）
// - 输入错误（读取/格式/内容）回到 Idle，绝不进入评审
// - 只有 Valid ∪ ValidWithWarnings 的行会被提交给 create
// ==========================================

use crate::config::ImportConfig;
use crate::domain::import::ImportResult;
use crate::domain::validation::{ValidationReport, ValidationSummary};
use crate::importer::bulk_importer::{BulkImporter, EligibleRow};
use crate::importer::error::{ImportError, ImporterResult};
use crate::importer::events::{
    OptionalEventPublisher, PipelineEvent, PipelineEventPublisher, PipelineStage,
};
use crate::importer::file_parser::{FileFormat, UniversalFileParser};
use crate::importer::import_traits::RecordSink;
use crate::importer::validator::Validator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// SourceFile - 待导入文件
// ==========================================
#[derive(Debug, Clone)]
pub enum SourceFile {
    /// 本地路径
    Path(PathBuf),
    /// 已在内存中的内容（如上传控件），name 用于判定格式
    Blob { name: String, bytes: Vec<u8> },
}

impl SourceFile {
    pub fn blob(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        SourceFile::Blob {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            SourceFile::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            SourceFile::Blob { name, .. } => name.clone(),
        }
    }

    async fn read(self) -> ImporterResult<Vec<u8>> {
        match self {
            SourceFile::Path(path) => Ok(tokio::fs::read(&path).await?),
            SourceFile::Blob { bytes, .. } => Ok(bytes),
        }
    }
}

// ==========================================
// ReviewSnapshot - 校验后的评审快照
// ==========================================
#[derive(Debug, Clone)]
pub struct ReviewSnapshot {
    pub file_name: String,
    pub format: FileFormat,
    pub report: ValidationReport,
}

impl ReviewSnapshot {
    pub fn summary(&self) -> ValidationSummary {
        self.report.summary()
    }
}

// ==========================================
// PipelineState - 管道状态（和类型）
// ==========================================
#[derive(Debug, Clone)]
pub enum PipelineState {
    Idle,
    Uploading {
        file_name: String,
    },
    Validating {
        file_name: String,
        format: FileFormat,
    },
    ReviewingResults(Arc<ReviewSnapshot>),
    Importing {
        review: Arc<ReviewSnapshot>,
        progress: u8,
    },
    Complete {
        review: Arc<ReviewSnapshot>,
        result: ImportResult,
    },
}

impl PipelineState {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineState::Idle => PipelineStage::Idle,
            PipelineState::Uploading { .. } => PipelineStage::Uploading,
            PipelineState::Validating { .. } => PipelineStage::Validating,
            PipelineState::ReviewingResults(_) => PipelineStage::ReviewingResults,
            PipelineState::Importing { .. } => PipelineStage::Importing,
            PipelineState::Complete { .. } => PipelineStage::Complete,
        }
    }
}

// ==========================================
// ImportPipeline - 管道控制器
// ==========================================
pub struct ImportPipeline {
    state: PipelineState,
    validator: Validator,
    sink: Option<Arc<dyn RecordSink>>, // None = 只校验
    publisher: OptionalEventPublisher,
}

impl ImportPipeline {
    pub fn new(validator: Validator, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            state: PipelineState::Idle,
            validator,
            sink: Some(sink),
            publisher: OptionalEventPublisher::none(),
        }
    }

    /// 只校验、不持有写入目标的管道（confirm_import 返回 ReviewOnly）
    pub fn review_only(config: &ImportConfig) -> Self {
        Self {
            state: PipelineState::Idle,
            validator: Validator::for_users(config.schema.clone(), config.locale.clone()),
            sink: None,
            publisher: OptionalEventPublisher::none(),
        }
    }

    /// 按导入配置（模式 + 语言）构建用户导入管道
    pub fn from_config(config: &ImportConfig, sink: Arc<dyn RecordSink>) -> Self {
        Self::new(
            Validator::for_users(config.schema.clone(), config.locale.clone()),
            sink,
        )
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn PipelineEventPublisher>) -> Self {
        self.publisher = OptionalEventPublisher::with_publisher(publisher);
        self
    }

    // ===== 查询 =====

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stage(&self) -> PipelineStage {
        self.state.stage()
    }

    pub fn review(&self) -> Option<&ReviewSnapshot> {
        match &self.state {
            PipelineState::ReviewingResults(review)
            | PipelineState::Importing { review, .. }
            | PipelineState::Complete { review, .. } => Some(review.as_ref()),
            _ => None,
        }
    }

    pub fn import_result(&self) -> Option<&ImportResult> {
        match &self.state {
            PipelineState::Complete { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match &self.state {
            PipelineState::Importing { progress, .. } => Some(*progress),
            PipelineState::Complete { .. } => Some(100),
            _ => None,
        }
    }

    // ===== 操作 =====

    /// 选择文件: 读取 → 解析 → 校验，成功后进入 ReviewingResults
    ///
    /// 任何输入错误都回到 Idle 并发布 Failed 事件
    #[instrument(skip(self, source), fields(file_name = %source.file_name()))]
    pub async fn select_file(&mut self, source: SourceFile) -> ImporterResult<ValidationSummary> {
        if !matches!(self.state, PipelineState::Idle) {
            return Err(self.invalid_transition("select_file"));
        }

        let file_name = source.file_name();
        self.transition(PipelineState::Uploading {
            file_name: file_name.clone(),
        });

        match self.load(source, file_name).await {
            Ok(snapshot) => {
                let summary = snapshot.summary();
                info!(
                    total = summary.total,
                    invalid = summary.invalid,
                    "文件校验完成，等待确认"
                );
                self.transition(PipelineState::ReviewingResults(Arc::new(snapshot)));
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "文件处理失败，管道回到 Idle");
                self.publisher.publish(PipelineEvent::Failed {
                    message: e.to_string(),
                });
                self.transition(PipelineState::Idle);
                Err(e)
            }
        }
    }

    async fn load(&mut self, source: SourceFile, file_name: String) -> ImporterResult<ReviewSnapshot> {
        let bytes = source.read().await?;
        let format = FileFormat::detect(&file_name, &bytes)?;
        debug!(format = format.as_str(), size = bytes.len(), "文件已读入内存");

        self.transition(PipelineState::Validating {
            file_name: file_name.clone(),
            format,
        });

        let rows = UniversalFileParser.parse(&bytes, format)?;
        let report = self.validator.validate(&rows);

        Ok(ReviewSnapshot {
            file_name,
            format,
            report,
        })
    }

    /// 确认导入: 逐条创建可导入行，完成后进入 Complete
    ///
    /// 无可导入行时返回 NothingToImport，停留在 ReviewingResults
    #[instrument(skip(self))]
    pub async fn confirm_import(&mut self) -> ImporterResult<ImportResult> {
        let review = match &self.state {
            PipelineState::ReviewingResults(review) => Arc::clone(review),
            _ => return Err(self.invalid_transition("confirm_import")),
        };
        let sink = match &self.sink {
            Some(sink) => Arc::clone(sink),
            None => return Err(ImportError::ReviewOnly),
        };

        if !review.report.is_importable() {
            warn!(file_name = %review.file_name, "没有可导入的行");
            return Err(ImportError::NothingToImport);
        }

        let rows: Vec<EligibleRow<'_>> = review
            .report
            .eligible()
            .into_iter()
            .map(|row| EligibleRow {
                row_number: row.row_number,
                record: &row.record,
            })
            .collect();

        self.transition(PipelineState::Importing {
            review: Arc::clone(&review),
            progress: 0,
        });

        let state = &mut self.state;
        let publisher = &self.publisher;
        let outcome = BulkImporter::new()
            .import(&rows, sink.as_ref(), |percent| {
                if let PipelineState::Importing { progress, .. } = state {
                    *progress = percent;
                }
                publisher.publish(PipelineEvent::Progress { percent });
            })
            .await;

        match outcome {
            Ok(result) => {
                self.publisher.publish(PipelineEvent::Completed {
                    total: result.total,
                    succeeded: result.succeeded,
                    failed: result.failed,
                });
                self.transition(PipelineState::Complete {
                    review: Arc::clone(&review),
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                self.transition(PipelineState::ReviewingResults(review));
                Err(e)
            }
        }
    }

    /// 重置: ReviewingResults/Complete → Idle，丢弃快照与结果
    pub fn reset(&mut self) -> ImporterResult<()> {
        match self.state {
            PipelineState::Idle => {
                debug!("管道已处于 Idle，忽略 reset");
                Ok(())
            }
            PipelineState::ReviewingResults(_) | PipelineState::Complete { .. } => {
                self.transition(PipelineState::Idle);
                Ok(())
            }
            _ => Err(self.invalid_transition("reset")),
        }
    }

    fn transition(&mut self, next: PipelineState) {
        let from = self.state.stage();
        let to = next.stage();
        self.state = next;
        if from != to {
            debug!(from = from.as_str(), to = to.as_str(), "管道状态变更");
            self.publisher
                .publish(PipelineEvent::StageChanged { stage: to });
        }
    }

    fn invalid_transition(&self, action: &str) -> ImportError {
        ImportError::InvalidTransition {
            from: self.state.stage().as_str().to_string(),
            action: action.to_string(),
        }
    }
}
