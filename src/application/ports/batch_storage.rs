//! Batch Storage Port - 出站端口
//!
//! 定义任务文件、批次文件与输出文件的本地存储抽象

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::BatchId;

/// 存储错误
#[derive(Debug, Error)]
pub enum BatchStorageError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Encode error: {0}")]
    EncodeError(String),
}

/// Batch Storage Port - 出站端口
///
/// 文件按前缀与目录命名；写入为覆盖语义且非原子，
/// 不支持多个写者同时写同一文件
#[async_trait]
pub trait BatchStoragePort: Send + Sync {
    /// 完整任务文件路径
    fn task_file_path(&self) -> PathBuf;

    /// 批次文件路径
    fn batch_file_path(&self, batch_id: &BatchId) -> PathBuf;

    /// 输出文件路径
    fn output_file_path(&self, output_file_id: &str) -> PathBuf;

    /// 以 JSON Lines 写入，自动创建目录，返回写入行数
    async fn write_lines(
        &self,
        path: &std::path::Path,
        lines: &[serde_json::Value],
    ) -> Result<usize, BatchStorageError>;

    /// 逐行读取并解析 JSON Lines，跳过空行
    async fn read_lines(
        &self,
        path: &std::path::Path,
    ) -> Result<Vec<serde_json::Value>, BatchStorageError>;

    /// 保存下载的输出内容
    async fn save_output(
        &self,
        output_file_id: &str,
        data: &[u8],
    ) -> Result<PathBuf, BatchStorageError>;

    /// 检查文件是否存在
    async fn exists(&self, path: &std::path::Path) -> bool;
}
