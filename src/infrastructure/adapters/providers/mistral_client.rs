//! Mistral Batch Client - 调用 Mistral Batch API
//!
//! 实现 BatchProviderPort trait
//!
//! Mistral Batch API:
//! POST /v1/files (multipart, purpose=batch)
//! POST /v1/batch/jobs {input_files, model, endpoint}
//! GET  /v1/batch/jobs/{id}, POST /v1/batch/jobs/{id}/cancel
//! GET  /v1/batch/jobs?page=&page_size=
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
use super::wire::{decode_mistral_task, encode_mistral_task};
use crate::application::ports::{
    BatchProviderPort, CreateJobRequest, JobPage, ProviderError, ProviderKind,
};
use crate::domain::{FileHandle, JobHandle, JobList, JobStatus, RequestCounts, Task};

/// 创建作业请求体
#[derive(Debug, Serialize)]
struct CreateJobBody<'a> {
    input_files: Vec<&'a str>,
    model: &'a str,
    endpoint: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
    #[serde(default)]
    bytes: Option<u64>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BatchJobOut {
    id: String,
    status: String,
    #[serde(default)]
    input_files: Vec<String>,
    #[serde(default)]
    output_file: Option<String>,
    #[serde(default)]
    error_file: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    total_requests: Option<u64>,
    #[serde(default)]
    succeeded_requests: Option<u64>,
    #[serde(default)]
    failed_requests: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BatchJobsOut {
    #[serde(default)]
    data: Vec<BatchJobOut>,
    #[serde(default)]
    total: Option<u64>,
}

/// Mistral 状态字符串映射
pub(crate) fn map_mistral_status(raw: &str) -> JobStatus {
    match raw.to_uppercase().as_str() {
        "QUEUED" => JobStatus::Queued,
        "RUNNING" => JobStatus::Running,
        "SUCCESS" => JobStatus::Completed,
        "FAILED" => JobStatus::Failed,
        "TIMEOUT_EXCEEDED" => JobStatus::Expired,
        "CANCELLATION_REQUESTED" => JobStatus::Cancelling,
        "CANCELLED" => JobStatus::Cancelled,
        _ => JobStatus::Unknown(raw.to_string()),
    }
}

impl From<BatchJobOut> for JobHandle {
    fn from(job: BatchJobOut) -> Self {
        let request_counts = job.total_requests.map(|total| RequestCounts {
            total,
            completed: job.succeeded_requests.unwrap_or(0),
            failed: job.failed_requests.unwrap_or(0),
        });

        JobHandle {
            status: map_mistral_status(&job.status),
            raw_status: job.status,
            id: job.id,
            input_file_ids: job.input_files,
            output_file_id: job.output_file,
            error_file_id: job.error_file,
            created_at: timestamp(job.created_at),
            request_counts,
        }
    }
}

/// Mistral 批处理客户端
pub struct MistralBatchClient {
    client: Client,
    config: VendorClientConfig,
}

impl MistralBatchClient {
    /// 创建新的 Mistral 客户端
    pub fn new(config: VendorClientConfig) -> Result<Self, ProviderError> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }

    async fn send_for_job(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<JobHandle, ProviderError> {
        let response = request
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(map_send_error)?;
        let job: BatchJobOut = read_json(check_status(response).await?).await?;
        Ok(job.into())
    }
}

#[async_trait]
impl BatchProviderPort for MistralBatchClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mistral
    }

    fn encode_task(
        &self,
        task: &Task,
        _endpoint: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        encode_mistral_task(task)
    }

    fn decode_task(&self, line: serde_json::Value) -> Result<Task, ProviderError> {
        decode_mistral_task(line)
    }

    async fn upload_file(&self, path: &Path) -> Result<FileHandle, ProviderError> {
        let form = Form::new()
            .text("purpose", "batch")
            .part("file", file_part(path).await?);

        let url = self.config.url(&["v1", "files"])?;
        tracing::debug!(url = %url, path = %path.display(), "Uploading file to Mistral");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;
        let file: UploadedFile = read_json(check_status(response).await?).await?;

        Ok(FileHandle {
            id: file.id,
            filename: file.filename,
            bytes: file.bytes,
            created_at: timestamp(file.created_at),
        })
    }

    async fn create_job(&self, request: CreateJobRequest) -> Result<JobHandle, ProviderError> {
        let body = CreateJobBody {
            input_files: vec![request.input_file_id.as_str()],
            model: &request.model,
            endpoint: &request.endpoint,
            metadata: (!request.metadata.is_empty()).then_some(&request.metadata),
        };

        let url = self.config.url(&["v1", "batch", "jobs"])?;
        self.send_for_job(self.client.post(url).json(&body)).await
    }

    async fn retrieve_job(&self, job_id: &str) -> Result<JobHandle, ProviderError> {
        let url = self.config.url(&["v1", "batch", "jobs", job_id])?;
        self.send_for_job(self.client.get(url)).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<JobHandle, ProviderError> {
        let url = self.config.url(&["v1", "batch", "jobs", job_id, "cancel"])?;
        self.send_for_job(self.client.post(url)).await
    }

    async fn list_jobs(&self, page: JobPage) -> Result<JobList, ProviderError> {
        let page_number: u64 = match page.cursor.as_deref() {
            Some(cursor) => cursor.parse().map_err(|_| {
                ProviderError::InvalidResponse(format!("Invalid page cursor: {}", cursor))
            })?,
            None => 0,
        };

        let response = self
            .client
            .get(self.config.url(&["v1", "batch", "jobs"])?)
            .bearer_auth(&self.config.api_key)
            .query(&[
                ("page", page_number.to_string()),
                ("page_size", page.limit.to_string()),
            ])
            .send()
            .await
            .map_err(map_send_error)?;
        let list: BatchJobsOut = read_json(check_status(response).await?).await?;

        let seen = page_number.saturating_add(1).saturating_mul(u64::from(page.limit));
        let has_more = match list.total {
            Some(total) => seen < total,
            None => list.data.len() as u64 == u64::from(page.limit),
        };

        Ok(JobList {
            jobs: list.data.into_iter().map(Into::into).collect(),
            next_cursor: has_more.then(|| page_number.saturating_add(1).to_string()),
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
