// ==========================================
// 批量导入系统 - 导入层
// ==========================================
// 职责: 外部文件 → 原始记录 → 校验分类 → 逐条创建
// 支持: CSV（分号分隔）, JSON, Excel
// ==========================================

// 模块声明
pub mod bulk_importer;
pub mod error;
pub mod events;
pub mod field_mapper;
pub mod file_parser;
pub mod import_traits;
pub mod pipeline;
pub mod template;
pub mod validator;

// 重导出核心类型
pub use bulk_importer::{progress_percent, BulkImporter, EligibleRow, FnSink};
pub use error::{ImportError, ImporterResult};
pub use events::{
    ChannelEventPublisher, OptionalEventPublisher, PipelineEvent,
    PipelineEventPublisher, PipelineStage,
};
pub use field_mapper::{FieldMapper, MappingError};
pub use file_parser::{CsvParser, ExcelParser, FileFormat, JsonParser, UniversalFileParser};
pub use pipeline::{ImportPipeline, PipelineState, ReviewSnapshot, SourceFile};
pub use template::TemplateGenerator;
pub use validator::{UserRuleSet, Validator};

// 重导出 Trait 接口
pub use import_traits::{BatchState, FileParser, RecordSink, RuleContext, RuleSet};
