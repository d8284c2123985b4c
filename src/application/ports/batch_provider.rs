//! Batch Provider Port - vendor 批处理 API 抽象
//!
//! 定义上传、建作业、查询、取消、列表、下载的抽象接口，
//! 具体实现在 infrastructure/adapters/providers 层（OpenAI、Mistral、Fake）

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::domain::{FileHandle, JobHandle, JobList, Task};

/// Provider 错误
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service error (HTTP {status}): {message}")]
    ServiceError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// vendor 种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Mistral,
    /// 内存实现，用于测试与演练
    Fake,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Fake => "fake",
        }
    }

    /// 读取 API key 的环境变量名
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Mistral => Some("MISTRAL_API_KEY"),
            ProviderKind::Fake => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Mistral => "https://api.mistral.ai",
            ProviderKind::Fake => "memory://fake",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 创建作业请求
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    /// 已上传的输入文件 ID
    pub input_file_id: String,
    /// 模型名称（Mistral 需要，OpenAI 从任务行读取）
    pub model: String,
    /// 所有请求使用的 endpoint，如 /v1/chat/completions
    pub endpoint: String,
    /// 完成时间窗口（OpenAI 需要，如 "24h"）
    pub completion_window: String,
    pub metadata: HashMap<String, String>,
}

/// 作业列表分页参数
#[derive(Debug, Clone, Default)]
pub struct JobPage {
    pub limit: u32,
    /// 上一页返回的游标
    pub cursor: Option<String>,
}

/// Batch Provider Port
///
/// 每个 vendor 一个实现；对外契约一致，只在请求细节上不同
#[async_trait]
pub trait BatchProviderPort: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// 把任务编码为该 vendor 的批处理任务行
    fn encode_task(&self, task: &Task, endpoint: &str) -> Result<serde_json::Value, ProviderError>;

    /// 从任务行解码回任务
    fn decode_task(&self, line: serde_json::Value) -> Result<Task, ProviderError>;

    /// 上传批次文件（purpose=batch）
    async fn upload_file(&self, path: &Path) -> Result<FileHandle, ProviderError>;

    /// 注册引用已上传文件的批处理作业
    async fn create_job(&self, request: CreateJobRequest) -> Result<JobHandle, ProviderError>;

    /// 查询作业当前状态
    async fn retrieve_job(&self, job_id: &str) -> Result<JobHandle, ProviderError>;

    /// 请求取消作业
    async fn cancel_job(&self, job_id: &str) -> Result<JobHandle, ProviderError>;

    /// 列出作业，从新到旧
    async fn list_jobs(&self, page: JobPage) -> Result<JobList, ProviderError>;

    /// 下载文件内容
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ProviderError>;
}
