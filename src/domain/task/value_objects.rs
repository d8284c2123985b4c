//! Task Context - Value Objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskError;

/// 任务唯一标识（调用方提供，对应 vendor 的 custom_id）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Result<Self, TaskError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TaskError::EmptyId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 批次标识
///
/// 会出现在批次文件名中，因此不允许路径分隔符。
/// 组件本身不保证唯一性，由调用方避免冲突。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn new(id: impl Into<String>) -> Result<Self, TaskError> {
        let id = id.into();
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(TaskError::InvalidBatchId(id));
        }
        Ok(Self(id))
    }

    /// 基于时间生成批次 ID，`seq` 用于区分同一秒内生成的多个批次
    pub fn from_time(at: DateTime<Utc>, seq: usize) -> Self {
        Self(format!("{}_{}", at.format("%Y%m%d%H%M%S"), seq))
    }

    /// 使用当前时间生成
    pub fn generate(seq: usize) -> Self {
        Self::from_time(Utc::now(), seq)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
