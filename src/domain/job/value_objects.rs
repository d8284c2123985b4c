//! Job Context - Value Objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 作业状态
///
/// 两个 vendor 的状态字符串统一映射到这里，原始字符串保留在 `JobHandle::raw_status`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 排队中
    Queued,
    /// 输入文件校验中
    Validating,
    /// 运行中
    Running,
    /// 正在汇总结果
    Finalizing,
    /// 已请求取消
    Cancelling,
    /// 成功完成
    Completed,
    /// 失败
    Failed,
    /// 超出完成时间窗口
    Expired,
    /// 已取消
    Cancelled,
    /// 未识别的 vendor 状态，按非终止状态处理
    Unknown(String),
}

impl JobStatus {
    /// 终止状态之后不会再有状态变化
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Expired | JobStatus::Cancelled
        )
    }

    /// 只有成功完成的作业才有可下载的输出
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Validating => "validating",
            JobStatus::Running => "running",
            JobStatus::Finalizing => "finalizing",
            JobStatus::Cancelling => "cancelling",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Expired => "expired",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 已上传到 vendor 的文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: String,
    pub filename: Option<String>,
    pub bytes: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// 请求计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

/// vendor 分配的作业句柄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
    pub status: JobStatus,
    /// vendor 返回的原始状态字符串
    pub raw_status: String,
    pub input_file_ids: Vec<String>,
    /// 仅在作业成功完成后存在
    pub output_file_id: Option<String>,
    pub error_file_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub request_counts: Option<RequestCounts>,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, status: JobStatus, raw_status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status,
            raw_status: raw_status.into(),
            input_file_ids: Vec::new(),
            output_file_id: None,
            error_file_id: None,
            created_at: None,
            request_counts: None,
        }
    }

    /// 可下载的输出文件 ID（作业未成功完成时为 None）
    pub fn downloadable_output(&self) -> Option<&str> {
        if self.status.is_success() {
            self.output_file_id.as_deref()
        } else {
            None
        }
    }
}

/// 作业列表的一页，按创建时间从新到旧
#[derive(Debug, Clone, Default)]
pub struct JobList {
    pub jobs: Vec<JobHandle>,
    /// 下一页游标，None 表示没有更多
    pub next_cursor: Option<String>,
}
