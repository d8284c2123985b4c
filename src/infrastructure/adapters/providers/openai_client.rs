//! OpenAI Batch Client - 调用 OpenAI Batch API
//!
//! 实现 BatchProviderPort trait
//!
//! OpenAI Batch API:
//! POST /v1/files (multipart, purpose=batch)       -> file object
//! POST /v1/batches {input_file_id, endpoint, completion_window}
//! GET  /v1/batches/{id}, POST /v1/batches/{id}/cancel
//! GET  /v1/batches?limit=&after=
//! GET  /v1/files/{id}/content

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::http::{
    check_status, file_part, map_send_error, read_json, timestamp, VendorClientConfig,
};
use super::wire::{decode_openai_task, encode_openai_task};
use crate::application::ports::{
    BatchProviderPort, CreateJobRequest, JobPage, ProviderError, ProviderKind,
};
use crate::domain::{FileHandle, JobHandle, JobList, JobStatus, RequestCounts, Task};

/// 创建批处理请求体
#[derive(Debug, Serialize)]
struct CreateBatchBody<'a> {
    input_file_id: &'a str,
    endpoint: &'a str,
    completion_window: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct FileObject {
    id: String,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchRequestCounts {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    completed: u64,
    #[serde(default)]
    failed: u64,
}

#[derive(Debug, Deserialize)]
struct BatchObject {
    id: String,
    status: String,
    #[serde(default)]
    input_file_id: Option<String>,
    #[serde(default)]
    output_file_id: Option<String>,
    #[serde(default)]
    error_file_id: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    request_counts: Option<BatchRequestCounts>,
}

#[derive(Debug, Deserialize)]
struct BatchListObject {
    data: Vec<BatchObject>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

/// OpenAI 状态字符串映射
pub(crate) fn map_openai_status(raw: &str) -> JobStatus {
    match raw.to_lowercase().as_str() {
        "validating" => JobStatus::Validating,
        "in_progress" => JobStatus::Running,
        "finalizing" => JobStatus::Finalizing,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "expired" => JobStatus::Expired,
        "cancelling" => JobStatus::Cancelling,
        "cancelled" => JobStatus::Cancelled,
        _ => JobStatus::Unknown(raw.to_string()),
    }
}

impl From<BatchObject> for JobHandle {
    fn from(batch: BatchObject) -> Self {
        JobHandle {
            status: map_openai_status(&batch.status),
            raw_status: batch.status,
            id: batch.id,
            input_file_ids: batch.input_file_id.into_iter().collect(),
            output_file_id: batch.output_file_id,
            error_file_id: batch.error_file_id,
            created_at: timestamp(batch.created_at),
            request_counts: batch.request_counts.map(|c| RequestCounts {
                total: c.total,
                completed: c.completed,
                failed: c.failed,
            }),
        }
    }
}

/// OpenAI 批处理客户端
pub struct OpenAiBatchClient {
    client: Client,
    config: VendorClientConfig,
}

impl OpenAiBatchClient {
    /// 创建新的 OpenAI 客户端
    pub fn new(config: VendorClientConfig) -> Result<Self, ProviderError> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }

    async fn get_batch(&self, job_id: &str) -> Result<JobHandle, ProviderError> {
        let response = self
            .client
            .get(self.config.url(&["v1", "batches", job_id])?)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_send_error)?;
        let batch: BatchObject = read_json(check_status(response).await?).await?;
        Ok(batch.into())
    }
}

#[async_trait]
impl BatchProviderPort for OpenAiBatchClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn encode_task(
        &self,
        task: &Task,
        endpoint: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        encode_openai_task(task, endpoint)
    }

    fn decode_task(&self, line: serde_json::Value) -> Result<Task, ProviderError> {
        decode_openai_task(line)
    }

    async fn upload_file(&self, path: &Path) -> Result<FileHandle, ProviderError> {
        let form = Form::new()
            .text("purpose", "batch")
            .part("file", file_part(path).await?);

        let url = self.config.url(&["v1", "files"])?;
        tracing::debug!(url = %url, path = %path.display(), "Uploading file to OpenAI");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;
        let file: FileObject = read_json(check_status(response).await?).await?;

        Ok(FileHandle {
            id: file.id,
            filename: file.filename,
            bytes: file.bytes,
            created_at: timestamp(file.created_at),
        })
    }

    async fn create_job(&self, request: CreateJobRequest) -> Result<JobHandle, ProviderError> {
        let body = CreateBatchBody {
            input_file_id: &request.input_file_id,
            endpoint: &request.endpoint,
            completion_window: &request.completion_window,
            metadata: (!request.metadata.is_empty()).then_some(&request.metadata),
        };

        let response = self
            .client
            .post(self.config.url(&["v1", "batches"])?)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;
        let batch: BatchObject = read_json(check_status(response).await?).await?;
        Ok(batch.into())
    }

    async fn retrieve_job(&self, job_id: &str) -> Result<JobHandle, ProviderError> {
        self.get_batch(job_id).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<JobHandle, ProviderError> {
        let response = self
            .client
            .post(self.config.url(&["v1", "batches", job_id, "cancel"])?)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_send_error)?;
        let batch: BatchObject = read_json(check_status(response).await?).await?;
        Ok(batch.into())
    }

    async fn list_jobs(&self, page: JobPage) -> Result<JobList, ProviderError> {
        let mut query = vec![("limit", page.limit.to_string())];
        if let Some(after) = page.cursor {
            query.push(("after", after));
        }

        let response = self
            .client
            .get(self.config.url(&["v1", "batches"])?)
            .bearer_auth(&self.config.api_key)
            .query(&query)
            .send()
            .await
            .map_err(map_send_error)?;
        let list: BatchListObject = read_json(check_status(response).await?).await?;

        let next_cursor = if list.has_more {
            list.last_id
                .or_else(|| list.data.last().map(|batch| batch.id.clone()))
        } else {
            None
        };

        Ok(JobList {
            jobs: list.data.into_iter().map(Into::into).collect(),
            next_cursor,
        })
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(self.config.url(&["v1", "files", file_id, "content"])?)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_send_error)?;

        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| {
                ProviderError::InvalidResponse(format!("Failed to read file content: {}", e))
            })?;

        Ok(bytes.to_vec())
    }
}
