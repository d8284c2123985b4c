//! Status Poller - 作业状态轮询
//!
//! 固定间隔查询作业状态直到终止状态，带截止时间与取消令牌

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::BatchProviderPort;
use crate::domain::{JobHandle, JobStatus};

/// 默认查询间隔（3 分钟）
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(3 * 60);

/// 默认截止时间（24 小时，与 vendor 的完成窗口一致）
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// 轮询选项
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// 两次查询之间的固定等待
    pub interval: Duration,
    /// 截止时间，None 表示一直等到终止状态
    pub timeout: Option<Duration>,
    /// 连续查询失败的容忍次数，超过后错误向上传播
    pub max_consecutive_errors: u32,
    /// 调用方取消令牌
    pub cancel: CancellationToken,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CHECK_INTERVAL,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
            max_consecutive_errors: 5,
            cancel: CancellationToken::new(),
        }
    }
}

impl PollOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// 轮询作业直到终止状态
///
/// 首次查询即为终止状态时立即返回，不等待。
/// 非终止状态等待 `interval`（不超过剩余截止时间）后再次查询。
pub async fn poll_until_terminal(
    provider: &dyn BatchProviderPort,
    job_id: &str,
    options: &PollOptions,
) -> Result<JobHandle, ApplicationError> {
    let started = Instant::now();
    // 超出 Instant 可表示范围的截止时间视为不设上限
    let deadline = options
        .timeout
        .and_then(|timeout| started.checked_add(timeout));
    let mut consecutive_errors = 0u32;

    loop {
        if options.cancel.is_cancelled() {
            return Err(ApplicationError::PollCancelled(job_id.to_string()));
        }

        match provider.retrieve_job(job_id).await {
            Ok(job) if job.status.is_terminal() => {
                tracing::info!(
                    job_id = %job_id,
                    status = %job.status,
                    elapsed_secs = started.elapsed().as_secs(),
                    "Batch job reached terminal status"
                );
                return Ok(job);
            }
            Ok(job) => {
                consecutive_errors = 0;
                if let JobStatus::Unknown(raw) = &job.status {
                    tracing::warn!(
                        job_id = %job_id,
                        raw_status = %raw,
                        "Unrecognized job status, polling continues"
                    );
                }
                tracing::debug!(
                    job_id = %job_id,
                    status = %job.status,
                    interval_secs = options.interval.as_secs(),
                    "Batch job not finished yet"
                );
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors > options.max_consecutive_errors {
                    tracing::error!(
                        job_id = %job_id,
                        error = %e,
                        attempts = consecutive_errors,
                        "Giving up on batch job status"
                    );
                    return Err(e.into());
                }
                tracing::warn!(
                    job_id = %job_id,
                    error = %e,
                    attempt = consecutive_errors,
                    "Error checking batch job status, retrying"
                );
            }
        }

        let wait = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ApplicationError::PollTimeout {
                        job_id: job_id.to_string(),
                        waited_secs: started.elapsed().as_secs(),
                    });
                }
                options.interval.min(deadline - now)
            }
            None => options.interval,
        };

        tokio::select! {
            _ = options.cancel.cancelled() => {
                return Err(ApplicationError::PollCancelled(job_id.to_string()));
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::ProviderError;
    use crate::infrastructure::adapters::FakeBatchProvider;

    fn job_with_script(script: Vec<JobStatus>) -> (FakeBatchProvider, String) {
        let provider = FakeBatchProvider::with_status_script(script);
        let job_id = provider.seed_job(JobHandle::new("batch-1", JobStatus::Queued, "queued"));
        (provider, job_id)
    }

    #[tokio::test]
    async fn test_terminal_on_first_query_returns_without_waiting() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Completed]);
        let options = PollOptions::every(Duration::from_secs(3600));

        let job = tokio::time::timeout(
            Duration::from_secs(5),
            poll_until_terminal(&provider, &job_id, &options),
        )
        .await
        .expect("poller must not sleep on an already terminal job")
        .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(provider.retrieve_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_non_terminal_statuses() {
        let (provider, job_id) = job_with_script(vec![
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
        ]);
        let options = PollOptions::every(Duration::from_secs(60)).with_timeout(None);

        let started = Instant::now();
        let job = poll_until_terminal(&provider, &job_id, &options).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(provider.retrieve_count(), 3);
        // 三次查询之间恰好两次等待
        assert!(elapsed >= Duration::from_secs(120), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(180), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_capped_by_deadline() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Running]);
        let options = PollOptions::every(Duration::from_secs(600))
            .with_timeout(Some(Duration::from_secs(90)));

        let started = Instant::now();
        let err = poll_until_terminal(&provider, &job_id, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::PollTimeout { waited_secs: 90, .. }));
        assert!(started.elapsed() < Duration::from_secs(600));
        assert_eq!(provider.retrieve_count(), 2);
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_means_no_deadline() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Running, JobStatus::Completed]);
        let options = PollOptions::every(Duration::ZERO).with_timeout(Some(Duration::MAX));

        let job = poll_until_terminal(&provider, &job_id, &options).await.unwrap();

        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_status_is_returned_not_raised() {
        let (provider, job_id) =
            job_with_script(vec![JobStatus::Running, JobStatus::Expired]);

        let job = poll_until_terminal(&provider, &job_id, &PollOptions::every(Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Expired);
        assert_eq!(job.downloadable_output(), None);
    }

    #[tokio::test]
    async fn test_deadline_stops_stuck_job() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Running]);
        let options = PollOptions::every(Duration::from_millis(10))
            .with_timeout(Some(Duration::from_millis(60)));

        let err = poll_until_terminal(&provider, &job_id, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::PollTimeout { .. }));
        assert!(provider.retrieve_count() >= 2);
    }

    #[tokio::test]
    async fn test_cancel_before_first_query() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Completed]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let options = PollOptions::default().with_cancel(cancel);

        let err = poll_until_terminal(&provider, &job_id, &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::PollCancelled(_)));
        assert_eq!(provider.retrieve_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Running]);
        let cancel = CancellationToken::new();
        let options = PollOptions::every(Duration::from_secs(3600)).with_cancel(cancel.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let err = poll_until_terminal(&provider, &job_id, &options)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, ApplicationError::PollCancelled(_)));
        assert_eq!(provider.retrieve_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Completed]);
        provider.fail_next_retrievals(2);

        let job = poll_until_terminal(&provider, &job_id, &PollOptions::every(Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(provider.retrieve_count(), 3);
    }

    #[tokio::test]
    async fn test_errors_propagate_past_limit() {
        let (provider, job_id) = job_with_script(vec![JobStatus::Completed]);
        provider.fail_next_retrievals(3);
        let options = PollOptions::every(Duration::ZERO).with_max_consecutive_errors(1);

        let err = poll_until_terminal(&provider, &job_id, &options)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::Provider(ProviderError::NetworkError(_))
        ));
        assert_eq!(provider.retrieve_count(), 2);
    }
}
