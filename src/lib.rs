// ==========================================
// 批量导入系统 - 核心库
// ==========================================
// 流程: 文件 → 解析 → 校验 → 人工确认 → 逐条创建
// 技术栈: Rust + SQLite（本地用户表 / 配置表）
// 系统定位: 操作员最终确认后才写入
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "es");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录、模式、校验结果、导入结果
pub mod domain;

// 导入层 - 解析、校验、导入、管道、模板
pub mod importer;

// 配置层 - 导入配置
pub mod config;

// 数据仓储层 - 用户表
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    FieldSchema, FieldValue, ImportResult, RawRecord, UserRecord, UserType, ValidatedRow,
    ValidationOutcome, ValidationReport,
};

// 导入
pub use importer::{
    BulkImporter, ImportError, ImportPipeline, PipelineEvent, PipelineStage, PipelineState,
    RecordSink, SourceFile, TemplateGenerator, UniversalFileParser, Validator,
};

// 配置与仓储
pub use config::{ConfigManager, ImportConfig, ImportConfigReader};
pub use repository::UserRepository;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "bulk-import";
