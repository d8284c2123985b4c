//! Job Query Handlers

use std::path::PathBuf;
use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::JobPage;
use crate::application::processor::BatchProcessor;
use crate::application::queries::{CollectOutputs, GetJob};
use crate::domain::{JobHandle, JobStatus};

// ============================================================================
// Response DTOs
// ============================================================================

/// 收集结果中的一个作业
#[derive(Debug, Clone)]
pub struct CollectedJob {
    pub job_id: String,
    pub status: JobStatus,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// 输出收集响应
#[derive(Debug, Clone, Default)]
pub struct CollectOutputsResponse {
    pub jobs: Vec<CollectedJob>,
    /// 是否在 stop_at_job_id 处停止
    pub reached_stop_marker: bool,
}

impl CollectOutputsResponse {
    pub fn saved(&self) -> usize {
        self.jobs.iter().filter(|j| j.output_path.is_some()).count()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GetJob Handler
pub struct GetJobHandler {
    processor: Arc<BatchProcessor>,
}

impl GetJobHandler {
    pub fn new(processor: Arc<BatchProcessor>) -> Self {
        Self { processor }
    }

    pub async fn handle(&self, query: GetJob) -> Result<JobHandle, ApplicationError> {
        Ok(self.processor.provider().retrieve_job(&query.job_id).await?)
    }
}

/// CollectOutputs Handler
pub struct CollectOutputsHandler {
    processor: Arc<BatchProcessor>,
}

impl CollectOutputsHandler {
    pub fn new(processor: Arc<BatchProcessor>) -> Self {
        Self { processor }
    }

    pub async fn handle(
        &self,
        query: CollectOutputs,
    ) -> Result<CollectOutputsResponse, ApplicationError> {
        if query.page_size == 0 {
            return Err(ApplicationError::validation("Page size cannot be 0"));
        }

        let mut response = CollectOutputsResponse::default();
        let mut cursor = None;

        'pages: loop {
            if query.max_jobs.is_some_and(|max| response.jobs.len() >= max) {
                break;
            }

            let page = self
                .processor
                .provider()
                .list_jobs(JobPage {
                    limit: query.page_size,
                    cursor: cursor.take(),
                })
                .await?;

            for job in page.jobs {
                if query.stop_at_job_id.as_deref() == Some(job.id.as_str()) {
                    tracing::info!(job_id = %job.id, "Reached stop marker");
                    response.reached_stop_marker = true;
                    break 'pages;
                }
                if query.max_jobs.is_some_and(|max| response.jobs.len() >= max) {
                    tracing::info!(max_jobs = ?query.max_jobs, "Reached job limit");
                    break 'pages;
                }
                response.jobs.push(self.collect_one(job).await);
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::info!(
            inspected = response.jobs.len(),
            saved = response.saved(),
            reached_stop_marker = response.reached_stop_marker,
            "Output collection finished"
        );
        Ok(response)
    }

    async fn collect_one(&self, job: JobHandle) -> CollectedJob {
        if job.downloadable_output().is_none() {
            tracing::debug!(job_id = %job.id, status = %job.status, "No output to collect");
            return CollectedJob {
                job_id: job.id,
                status: job.status,
                output_path: None,
                error: None,
            };
        }

        match self.processor.save_job_output(&job).await {
            Ok(path) => CollectedJob {
                job_id: job.id,
                status: job.status,
                output_path: Some(path),
                error: None,
            },
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to collect output");
                CollectedJob {
                    job_id: job.id,
                    status: job.status,
                    output_path: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::processor::ProcessorSettings;
    use crate::infrastructure::adapters::{FakeBatchProvider, FileBatchStorage, StorageLayout};
    use tempfile::{tempdir, TempDir};

    fn completed(id: &str, output: &str) -> JobHandle {
        let mut job = JobHandle::new(id, JobStatus::Completed, "completed");
        job.output_file_id = Some(output.to_string());
        job
    }

    /// 按创建顺序 seed：job-1 最旧，job-4 最新
    fn setup() -> (Arc<BatchProcessor>, Arc<FakeBatchProvider>, TempDir) {
        let provider = Arc::new(FakeBatchProvider::new());
        provider.seed_file("out-1", b"{\"custom_id\":\"a\"}\n".to_vec());
        provider.seed_file("out-3", b"{\"custom_id\":\"c\"}\n".to_vec());
        provider.seed_job(completed("job-1", "out-1"));
        provider.seed_job(JobHandle::new("job-2", JobStatus::Failed, "failed"));
        provider.seed_job(completed("job-3", "out-3"));
        provider.seed_job(completed("job-4", "out-missing"));

        let temp_dir = tempdir().unwrap();
        let storage = FileBatchStorage::new(StorageLayout::under(temp_dir.path(), "collect"));
        let processor = BatchProcessor::new(
            ProcessorSettings::new("gpt-4o-mini"),
            provider.clone(),
            Arc::new(storage),
        );
        (Arc::new(processor), provider, temp_dir)
    }

    #[tokio::test]
    async fn test_collects_until_stop_marker() {
        let (processor, _provider, _dir) = setup();

        let response = CollectOutputsHandler::new(processor)
            .handle(CollectOutputs {
                stop_at_job_id: Some("job-2".to_string()),
                page_size: 1,
                max_jobs: None,
            })
            .await
            .unwrap();

        let ids: Vec<&str> = response.jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["job-4", "job-3"]);
        assert!(response.reached_stop_marker);
        // job-4 的输出文件不存在，只报告错误不终止遍历
        assert!(response.jobs[0].error.is_some());
        assert!(response.jobs[1].output_path.is_some());
        assert_eq!(response.saved(), 1);
    }

    #[tokio::test]
    async fn test_collects_everything_without_marker() {
        let (processor, _provider, _dir) = setup();

        let response = CollectOutputsHandler::new(processor)
            .handle(CollectOutputs::default())
            .await
            .unwrap();

        assert_eq!(response.jobs.len(), 4);
        assert!(!response.reached_stop_marker);
        assert_eq!(response.saved(), 2);
        let failed = response.jobs.iter().find(|j| j.job_id == "job-2").unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.output_path.is_none() && failed.error.is_none());
    }

    #[tokio::test]
    async fn test_max_jobs_limits_collection_across_pages() {
        let (processor, _provider, _dir) = setup();

        let response = CollectOutputsHandler::new(processor.clone())
            .handle(CollectOutputs {
                stop_at_job_id: None,
                page_size: 2,
                max_jobs: Some(3),
            })
            .await
            .unwrap();

        let ids: Vec<&str> = response.jobs.iter().map(|j| j.job_id.as_str()).collect();
        assert_eq!(ids, vec!["job-4", "job-3", "job-2"]);
        assert!(!response.reached_stop_marker);
        assert_eq!(response.saved(), 1);

        let none = CollectOutputsHandler::new(processor)
            .handle(CollectOutputs {
                max_jobs: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_get_job_does_not_poll() {
        let (processor, provider, _dir) = setup();

        let job = GetJobHandler::new(processor)
            .handle(GetJob {
                job_id: "job-2".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(provider.retrieve_count(), 1);
    }
}
