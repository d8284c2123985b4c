//! Task Context - Errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("任务 ID 不能为空")]
    EmptyId,

    #[error("任务 ID 重复: {0}")]
    DuplicateId(String),

    #[error("ID 数量 ({ids}) 与消息组数量 ({messages}) 不一致")]
    LengthMismatch { ids: usize, messages: usize },

    #[error("无效的批次大小: {0}")]
    InvalidBatchSize(usize),

    #[error("无效的批次 ID: {0}")]
    InvalidBatchId(String),

    #[error("无效的任务区间: start={start}, end={end}, total={total}")]
    InvalidRange {
        start: usize,
        end: usize,
        total: usize,
    },
}
