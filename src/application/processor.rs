//! Batch Processor - 批处理生命周期
//!
//! 任务构建 → 任务/批次文件 → 上传 → 建作业 → 轮询 → 保存输出
//!
//! vendor 差异全部在 `BatchProviderPort` 实现里，这里对两个 vendor 一视同仁。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::poller::{poll_until_terminal, PollOptions};
use crate::application::ports::{BatchProviderPort, BatchStoragePort, CreateJobRequest};
use crate::domain::{
    build_tasks, BatchId, ChatMessage, FileHandle, GenerationParameters, JobHandle, Task, TaskId,
};

/// 默认 endpoint
pub const DEFAULT_ENDPOINT: &str = "/v1/chat/completions";

/// 默认完成时间窗口
pub const DEFAULT_COMPLETION_WINDOW: &str = "24h";

/// 处理器级配置（附加到每个任务上）
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub model_name: String,
    pub parameters: GenerationParameters,
    pub endpoint: String,
    pub completion_window: String,
}

impl ProcessorSettings {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            parameters: GenerationParameters {
                max_tokens: None,
                temperature: Some(0.1),
                json_response: false,
            },
            endpoint: DEFAULT_ENDPOINT.to_string(),
            completion_window: DEFAULT_COMPLETION_WINDOW.to_string(),
        }
    }

    pub fn with_parameters(mut self, parameters: GenerationParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// 批处理器
///
/// 单线程顺序执行；同一时间只轮询一个作业
pub struct BatchProcessor {
    settings: ProcessorSettings,
    provider: Arc<dyn BatchProviderPort>,
    storage: Arc<dyn BatchStoragePort>,
}

impl BatchProcessor {
    pub fn new(
        settings: ProcessorSettings,
        provider: Arc<dyn BatchProviderPort>,
        storage: Arc<dyn BatchStoragePort>,
    ) -> Self {
        Self {
            settings,
            provider,
            storage,
        }
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn provider(&self) -> &Arc<dyn BatchProviderPort> {
        &self.provider
    }

    pub fn storage(&self) -> &Arc<dyn BatchStoragePort> {
        &self.storage
    }

    /// 构建单个任务
    pub fn create_task(
        &self,
        id: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Result<Task, ApplicationError> {
        let id = TaskId::new(id)?;
        Ok(Task::new(
            id,
            self.settings.model_name.clone(),
            messages,
            self.settings.parameters.clone(),
        ))
    }

    /// 由并列的 id 与消息组构建任务，保持输入顺序
    pub fn create_tasks(
        &self,
        ids: Vec<String>,
        message_sets: Vec<Vec<ChatMessage>>,
    ) -> Result<Vec<Task>, ApplicationError> {
        let tasks = build_tasks(
            ids,
            message_sets,
            &self.settings.model_name,
            &self.settings.parameters,
        )?;
        tracing::debug!(count = tasks.len(), "Tasks built");
        Ok(tasks)
    }

    /// 写入完整任务文件（覆盖同名文件）
    pub async fn write_task_file(&self, tasks: &[Task]) -> Result<PathBuf, ApplicationError> {
        let path = self.storage.task_file_path();
        let lines = self.encode_all(tasks)?;
        let written = self.storage.write_lines(&path, &lines).await?;

        tracing::info!(path = %path.display(), tasks = written, "Task file written");
        Ok(path)
    }

    /// 读回任务文件
    pub async fn read_task_file(&self) -> Result<Vec<Task>, ApplicationError> {
        let path = self.storage.task_file_path();
        if !self.storage.exists(&path).await {
            return Err(ApplicationError::not_found(
                "Task file",
                path.display().to_string(),
            ));
        }

        self.storage
            .read_lines(&path)
            .await?
            .into_iter()
            .map(|line| self.provider.decode_task(line).map_err(Into::into))
            .collect()
    }

    /// 写入一个批次文件
    ///
    /// 不检查 batch_id 是否已被使用，同名文件会被覆盖
    pub async fn write_batch_file(
        &self,
        tasks: &[Task],
        batch_id: &BatchId,
    ) -> Result<PathBuf, ApplicationError> {
        let path = self.storage.batch_file_path(batch_id);
        if tasks.is_empty() {
            tracing::warn!(batch_id = %batch_id, "No requests to write for batch");
        }

        let lines = self.encode_all(tasks)?;
        let written = self.storage.write_lines(&path, &lines).await?;

        tracing::info!(
            batch_id = %batch_id,
            path = %path.display(),
            requests = written,
            "Batch file written"
        );
        Ok(path)
    }

    /// 上传批次文件
    ///
    /// 文件不存在时不调用 vendor
    pub async fn upload_batch_file(
        &self,
        batch_id: &BatchId,
    ) -> Result<FileHandle, ApplicationError> {
        let path = self.storage.batch_file_path(batch_id);
        if !self.storage.exists(&path).await {
            return Err(ApplicationError::not_found(
                "Batch file",
                path.display().to_string(),
            ));
        }

        tracing::info!(
            path = %path.display(),
            provider = %self.provider.kind(),
            "Uploading batch file"
        );
        let file = self.provider.upload_file(&path).await?;
        tracing::info!(batch_id = %batch_id, file_id = %file.id, "Batch file uploaded");
        Ok(file)
    }

    /// 创建引用已上传文件的批处理作业
    pub async fn create_batch_job(
        &self,
        batch_file: &FileHandle,
    ) -> Result<JobHandle, ApplicationError> {
        let request = CreateJobRequest {
            input_file_id: batch_file.id.clone(),
            model: self.settings.model_name.clone(),
            endpoint: self.settings.endpoint.clone(),
            completion_window: self.settings.completion_window.clone(),
            metadata: HashMap::new(),
        };

        let job = self.provider.create_job(request).await?;
        tracing::info!(
            job_id = %job.id,
            input_file_id = %batch_file.id,
            status = %job.status,
            "Batch job created"
        );
        Ok(job)
    }

    /// 轮询作业直到终止状态
    ///
    /// failed/expired/cancelled 作为正常结果返回，由调用方决定如何处理
    pub async fn check_batch_job_status(
        &self,
        job_id: &str,
        options: &PollOptions,
    ) -> Result<JobHandle, ApplicationError> {
        poll_until_terminal(self.provider.as_ref(), job_id, options).await
    }

    /// 请求取消作业
    pub async fn cancel_batch_job(&self, job_id: &str) -> Result<JobHandle, ApplicationError> {
        let job = self.provider.cancel_job(job_id).await?;
        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            "Batch job cancellation requested"
        );
        Ok(job)
    }

    /// 下载输出文件并保存到输出目录
    ///
    /// 下载成功之后才写文件，下载失败不会留下空文件
    pub async fn save_batch_output(
        &self,
        output_file_id: &str,
    ) -> Result<PathBuf, ApplicationError> {
        if output_file_id.trim().is_empty() {
            return Err(ApplicationError::validation("Output file id cannot be empty"));
        }

        let data = self.provider.download_file(output_file_id).await?;
        let path = self.storage.save_output(output_file_id, &data).await?;

        tracing::info!(
            output_file_id = %output_file_id,
            path = %path.display(),
            bytes = data.len(),
            "Batch output saved"
        );
        Ok(path)
    }

    /// 保存已成功完成作业的输出
    pub async fn save_job_output(&self, job: &JobHandle) -> Result<PathBuf, ApplicationError> {
        let output_file_id = job.downloadable_output().ok_or_else(|| {
            ApplicationError::invalid_state(format!(
                "Job {} has no downloadable output (status: {})",
                job.id, job.status
            ))
        })?;
        self.save_batch_output(output_file_id).await
    }

    fn encode_all(&self, tasks: &[Task]) -> Result<Vec<serde_json::Value>, ApplicationError> {
        tasks
            .iter()
            .map(|task| {
                self.provider
                    .encode_task(task, &self.settings.endpoint)
                    .map_err(Into::into)
            })
            .collect()
    }
}
