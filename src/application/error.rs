//! 应用层错误定义
//!
//! 统一的处理器/命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{BatchStorageError, ProviderError};
use crate::domain::TaskError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// vendor 调用错误
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// 本地存储错误
    #[error("Storage error: {0}")]
    Storage(#[from] BatchStorageError),

    /// 轮询超过截止时间仍未到达终止状态
    #[error("Polling job {job_id} timed out after {waited_secs}s")]
    PollTimeout { job_id: String, waited_secs: u64 },

    /// 轮询被调用方取消
    #[error("Polling job {0} was cancelled")]
    PollCancelled(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

impl From<TaskError> for ApplicationError {
    fn from(err: TaskError) -> Self {
        Self::ValidationError(err.to_string())
    }
}
