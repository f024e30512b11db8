// ==========================================
// 批量导入系统 - 管道事件发布
// ==========================================
// 职责: 定义管道事件与发布 trait，供展示层订阅
// 说明: 管道只依赖 trait；UI/CLI 选择具体实现
// ==========================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

// ==========================================
// PipelineStage - 管道阶段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    Idle,
    Uploading,
    Validating,
    ReviewingResults,
    Importing,
    Complete,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "Idle",
            PipelineStage::Uploading => "Uploading",
            PipelineStage::Validating => "Validating",
            PipelineStage::ReviewingResults => "ReviewingResults",
            PipelineStage::Importing => "Importing",
            PipelineStage::Complete => "Complete",
        }
    }
}

// ==========================================
// PipelineEvent - 管道事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineEvent {
    /// 阶段变更
    StageChanged { stage: PipelineStage },
    /// 导入进度（百分比）
    Progress { percent: u8 },
    /// 导入完成
    Completed {
        total: usize,
        succeeded: usize,
        failed: usize,
    },
    /// 运行中止（解析/读取失败）
    Failed { message: String },
}

// ==========================================
// 事件发布 Trait
// ==========================================
pub trait PipelineEventPublisher: Send + Sync {
    fn publish(&self, event: PipelineEvent);
}

/// 基于 tokio 通道的发布者（接收端由展示层持有）
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: UnboundedSender<PipelineEvent>,
}

impl ChannelEventPublisher {
    pub fn new(sender: UnboundedSender<PipelineEvent>) -> Self {
        Self { sender }
    }
}

impl PipelineEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: PipelineEvent) {
        // 接收端已关闭时丢弃事件
        if self.sender.send(event).is_err() {
            tracing::debug!("ChannelEventPublisher: 接收端已关闭");
        }
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn PipelineEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn PipelineEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn publish(&self, event: PipelineEvent) {
        if let Some(publisher) = &self.inner {
            publisher.publish(event);
        }
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
