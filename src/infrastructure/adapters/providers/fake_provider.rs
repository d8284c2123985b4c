//! Fake Batch Provider - 内存中的 vendor
//!
//! 不发起任何网络请求：上传的文件、作业和输出都保存在内存里，
//! 作业状态按预设脚本推进。用于测试和演练（provider.kind = "fake"）。

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex as StdMutex, MutexGuard};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::wire::{
    decode_mistral_task, decode_openai_task, encode_mistral_task, encode_openai_task,
};
use crate::application::ports::{
    BatchProviderPort, CreateJobRequest, JobPage, ProviderError, ProviderKind,
};
use crate::domain::{FileHandle, JobHandle, JobList, JobStatus, RequestCounts, Task};

/// Fake Batch Provider
///
/// 每次查询非终止作业时从状态脚本取下一个状态，脚本只剩最后一个时保持不变。
/// 作业进入 Completed 时根据输入文件生成一份输出文件。
pub struct FakeBatchProvider {
    /// 模拟的任务行格式
    wire_format: ProviderKind,
    status_script: Mutex<VecDeque<JobStatus>>,
    files: DashMap<String, Vec<u8>>,
    jobs: DashMap<String, JobHandle>,
    /// 作业创建顺序（旧 → 新）
    job_order: StdMutex<Vec<String>>,
    fail_uploads: AtomicBool,
    fail_job_creation: AtomicBool,
    pending_retrieval_failures: AtomicU32,
    uploads: AtomicUsize,
    jobs_created: AtomicUsize,
    retrievals: AtomicUsize,
}

impl FakeBatchProvider {
    /// 作业在第一次查询时即完成
    pub fn new() -> Self {
        Self::with_status_script(vec![JobStatus::Completed])
    }

    pub fn with_status_script(script: Vec<JobStatus>) -> Self {
        Self {
            wire_format: ProviderKind::OpenAi,
            status_script: Mutex::new(script.into()),
            files: DashMap::new(),
            jobs: DashMap::new(),
            job_order: StdMutex::new(Vec::new()),
            fail_uploads: AtomicBool::new(false),
            fail_job_creation: AtomicBool::new(false),
            pending_retrieval_failures: AtomicU32::new(0),
            uploads: AtomicUsize::new(0),
            jobs_created: AtomicUsize::new(0),
            retrievals: AtomicUsize::new(0),
        }
    }

    /// 使用 Mistral 的任务行格式
    pub fn with_wire_format(mut self, format: ProviderKind) -> Self {
        self.wire_format = format;
        self
    }

    /// 预置一个作业，返回作业 ID
    pub fn seed_job(&self, job: JobHandle) -> String {
        let id = job.id.clone();
        self.jobs.insert(id.clone(), job);
        self.order().push(id.clone());
        id
    }

    /// 预置一个可下载的文件
    pub fn seed_file(&self, id: impl Into<String>, content: Vec<u8>) {
        self.files.insert(id.into(), content);
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_job_creation(&self, fail: bool) {
        self.fail_job_creation.store(fail, Ordering::SeqCst);
    }

    /// 接下来的 n 次查询返回网络错误
    pub fn fail_next_retrievals(&self, n: u32) {
        self.pending_retrieval_failures.store(n, Ordering::SeqCst);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// 通过 create_job 创建的作业数（不含预置作业）
    pub fn job_count(&self) -> usize {
        self.jobs_created.load(Ordering::SeqCst)
    }

    pub fn retrieve_count(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }

    fn order(&self) -> MutexGuard<'_, Vec<String>> {
        self.job_order
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn next_status(&self) -> JobStatus {
        let mut script = self.status_script.lock().await;
        if script.len() > 1 {
            script.pop_front().unwrap_or(JobStatus::Completed)
        } else {
            script.front().cloned().unwrap_or(JobStatus::Completed)
        }
    }

    /// 为输入文件中的每个任务生成一行结果
    fn render_output(&self, job: &JobHandle) -> Vec<u8> {
        let mut output = Vec::new();
        for file_id in &job.input_file_ids {
            let Some(content) = self.files.get(file_id) else {
                continue;
            };
            for line in String::from_utf8_lossy(content.value()).lines() {
                let Ok(request) = serde_json::from_str::<serde_json::Value>(line) else {
                    continue;
                };
                let result = serde_json::json!({
                    "id": format!("req-{}", Uuid::new_v4()),
                    "custom_id": request.get("custom_id"),
                    "response": {"status_code": 200, "body": {"choices": []}},
                    "error": null
                });
                output.extend_from_slice(result.to_string().as_bytes());
                output.push(b'\n');
            }
        }
        output
    }
}

impl Default for FakeBatchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchProviderPort for FakeBatchProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fake
    }

    fn encode_task(
        &self,
        task: &Task,
        endpoint: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        match self.wire_format {
            ProviderKind::Mistral => encode_mistral_task(task),
            _ => encode_openai_task(task, endpoint),
        }
    }

    fn decode_task(&self, line: serde_json::Value) -> Result<Task, ProviderError> {
        match self.wire_format {
            ProviderKind::Mistral => decode_mistral_task(line),
            _ => decode_openai_task(line),
        }
    }

    async fn upload_file(&self, path: &Path) -> Result<FileHandle, ProviderError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ProviderError::ServiceError {
                status: 400,
                message: "upload rejected".to_string(),
            });
        }

        let content = tokio::fs::read(path)
            .await
            .map_err(|e| ProviderError::Io(e.to_string()))?;
        let id = format!("file-{}", Uuid::new_v4());
        let handle = FileHandle {
            id: id.clone(),
            filename: path.file_name().map(|n| n.to_string_lossy().to_string()),
            bytes: Some(content.len() as u64),
            created_at: Some(Utc::now()),
        };
        self.files.insert(id, content);

        tracing::debug!(file_id = %handle.id, "FakeBatchProvider: file stored");
        Ok(handle)
    }

    async fn create_job(&self, request: CreateJobRequest) -> Result<JobHandle, ProviderError> {
        if self.fail_job_creation.load(Ordering::SeqCst) {
            return Err(ProviderError::ServiceError {
                status: 500,
                message: "job creation rejected".to_string(),
            });
        }
        let lines = match self.files.get(&request.input_file_id) {
            Some(content) => String::from_utf8_lossy(content.value()).lines().count() as u64,
            None => return Err(ProviderError::NotFound(request.input_file_id)),
        };

        let mut job = JobHandle::new(
            format!("batch-{}", Uuid::new_v4()),
            JobStatus::Queued,
            "queued",
        );
        job.input_file_ids = vec![request.input_file_id];
        job.created_at = Some(Utc::now());
        job.request_counts = Some(RequestCounts {
            total: lines,
            ..Default::default()
        });

        self.jobs.insert(job.id.clone(), job.clone());
        self.order().push(job.id.clone());
        self.jobs_created.fetch_add(1, Ordering::SeqCst);
        Ok(job)
    }

    async fn retrieve_job(&self, job_id: &str) -> Result<JobHandle, ProviderError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        let failures = self.pending_retrieval_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.pending_retrieval_failures
                .store(failures - 1, Ordering::SeqCst);
            return Err(ProviderError::NetworkError("connection reset".to_string()));
        }

        let mut job = self
            .jobs
            .get(job_id)
            .map(|j| j.value().clone())
            .ok_or_else(|| ProviderError::NotFound(job_id.to_string()))?;

        if !job.status.is_terminal() {
            job.status = self.next_status().await;
            job.raw_status = job.status.to_string();

            if job.status.is_success() && job.output_file_id.is_none() {
                let output_id = format!("file-out-{}", Uuid::new_v4());
                let output = self.render_output(&job);
                if let Some(counts) = job.request_counts.as_mut() {
                    counts.completed = counts.total;
                }
                self.files.insert(output_id.clone(), output);
                job.output_file_id = Some(output_id);
            }
            self.jobs.insert(job.id.clone(), job.clone());
        }

        Ok(job)
    }

    async fn cancel_job(&self, job_id: &str) -> Result<JobHandle, ProviderError> {
        let mut job = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| ProviderError::NotFound(job_id.to_string()))?;
        if !job.status.is_terminal() {
            job.status = JobStatus::Cancelled;
            job.raw_status = job.status.to_string();
        }
        Ok(job.value().clone())
    }

    async fn list_jobs(&self, page: JobPage) -> Result<JobList, ProviderError> {
        let order = self.order().clone();
        let offset: usize = match page.cursor.as_deref() {
            Some(cursor) => cursor.parse().map_err(|_| {
                ProviderError::InvalidResponse(format!("Invalid cursor: {}", cursor))
            })?,
            None => 0,
        };
        let limit = page.limit.max(1) as usize;

        let jobs: Vec<JobHandle> = order
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .filter_map(|id| self.jobs.get(id).map(|j| j.value().clone()))
            .collect();
        let next = offset + limit;

        Ok(JobList {
            jobs,
            next_cursor: (next < order.len()).then(|| next.to_string()),
        })
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, ProviderError> {
        self.files
            .get(file_id)
            .map(|content| content.value().clone())
            .ok_or_else(|| {
                ProviderError::NotFound(format!("No such file object: {}", file_id))
            })
    }
}
