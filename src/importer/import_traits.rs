// ==========================================
// 批量导入系统 - 导入管道 Trait
// ==========================================
// 职责: 定义管道各阶段的接口（不包含实现）
// 流程: 解析 → 校验 → 预览 → 逐条创建 → 完成
// ==========================================

use crate::domain::record::RawRecord;
use crate::domain::schema::FieldSchema;
use crate::importer::error::ImporterResult;
use async_trait::async_trait;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（阶段 0）
// 实现者: CsvParser, JsonParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 将文件内容解析为原始行记录（按文件顺序）
    ///
    /// # 返回
    /// - Ok(Vec<RawRecord>): 行记录列表（不做语义校验）
    /// - Err: MalformedInput（内容无法按该格式解码）
    fn parse_to_raw_records(&self, bytes: &[u8]) -> ImporterResult<Vec<RawRecord>>;
}

// ==========================================
// RuleSet Trait
// ==========================================
// 用途: 依赖判别字段的校验规则（阶段 1）
// 实现者: UserRuleSet
// 说明: 必填字段规则由 Validator 按 FieldSchema 统一执行
pub trait RuleSet: Send + Sync {
    /// 格式规则（硬规则）：仅在字段存在且非空时检查
    ///
    /// # 返回
    /// - Vec<String>: 错误信息（非空即判定为 Invalid）
    fn format_errors(&self, record: &RawRecord, ctx: &RuleContext<'_>) -> Vec<String>;

    /// 角色相关完整性规则（软规则）
    ///
    /// # 返回
    /// - Vec<String>: 警告信息（不阻断导入）
    fn completeness_warnings(&self, record: &RawRecord, ctx: &RuleContext<'_>) -> Vec<String>;

    /// 批次内规则（软规则），按行顺序逐行调用
    ///
    /// # 参数
    /// - eligible: 该行没有硬错误（会被导入）
    /// - state: 由 Validator 在一次校验中持有的状态
    fn batch_warnings(
        &self,
        _record: &RawRecord,
        _row_number: usize,
        _eligible: bool,
        _ctx: &RuleContext<'_>,
        _state: &mut BatchState,
    ) -> Vec<String> {
        Vec::new()
    }
}

/// 规则执行上下文
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub schema: &'a FieldSchema,
    pub locale: &'a str, // 诊断信息语言
}

/// 一次校验运行内的批次状态（键 → 首个可导入行的行号）
#[derive(Debug, Default)]
pub struct BatchState {
    pub first_seen: std::collections::HashMap<String, usize>,
}

// ==========================================
// RecordSink Trait
// ==========================================
// 用途: 外部"创建记录"操作（阶段 3）
// 实现者: UserRepository（SQLite）、FnSink（闭包适配）、宿主应用的 REST 客户端
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// 创建一条记录
    ///
    /// # 返回
    /// - Ok(()): 创建成功
    /// - Err: 创建失败（由导入器捕获并计数，不中断批次）
    async fn create(&self, record: &RawRecord) -> anyhow::Result<()>;
}
