//! Batch Command Handlers

use std::sync::Arc;

use crate::application::commands::batch_commands::*;
use crate::application::error::ApplicationError;
use crate::application::processor::BatchProcessor;
use crate::domain::{plan_batches, BatchId, Task};

/// RunBatches Handler - 顺序提交所有批次
///
/// 每批依次：写文件 → 上传 → 建作业 → 轮询 → 保存输出。
/// 提交失败只跳过当前批次；文件系统错误直接向上传播；取消则结束整个循环。
pub struct RunBatchesHandler {
    processor: Arc<BatchProcessor>,
}

impl RunBatchesHandler {
    pub fn new(processor: Arc<BatchProcessor>) -> Self {
        Self { processor }
    }

    pub async fn handle(
        &self,
        tasks: &[Task],
        cmd: RunBatchesCommand,
    ) -> Result<RunBatchesReport, ApplicationError> {
        let ranges = plan_batches(tasks.len(), cmd.start_index, cmd.end_index, cmd.batch_size)?;

        tracing::info!(
            total_tasks = tasks.len(),
            start_index = cmd.start_index,
            end_index = ?cmd.end_index,
            batch_size = cmd.batch_size,
            batches = ranges.len(),
            "Running batches"
        );

        let mut report = RunBatchesReport::default();

        for (seq, range) in ranges.into_iter().enumerate() {
            let batch_id = BatchId::generate(seq);

            // 取消后不再写文件、上传或创建 vendor 作业
            if cmd.poll.cancel.is_cancelled() {
                tracing::info!(
                    batch_id = %batch_id,
                    "Run cancelled, not submitting remaining batches"
                );
                report.cancelled = true;
                break;
            }

            if range.is_empty() {
                tracing::warn!(
                    batch_id = %batch_id,
                    start = range.start,
                    "Empty batch slice, skipping"
                );
                report.outcomes.push(BatchOutcome {
                    batch_id,
                    range,
                    kind: BatchOutcomeKind::Skipped {
                        reason: format!("empty slice at index {}", range.start),
                    },
                });
                continue;
            }

            self.processor
                .write_batch_file(&tasks[range.start..range.end], &batch_id)
                .await?;

            let file = match self.processor.upload_batch_file(&batch_id).await {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(
                        batch_id = %batch_id,
                        error = %e,
                        "Upload failed, skipping batch"
                    );
                    report.outcomes.push(BatchOutcome {
                        batch_id,
                        range,
                        kind: BatchOutcomeKind::SubmitFailed {
                            stage: SubmitStage::Upload,
                            error: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            // 上传期间收到取消时，已上传的文件不再建作业
            if cmd.poll.cancel.is_cancelled() {
                tracing::info!(
                    batch_id = %batch_id,
                    file_id = %file.id,
                    "Run cancelled after upload, job not created"
                );
                report.cancelled = true;
                break;
            }

            let job = match self.processor.create_batch_job(&file).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(
                        batch_id = %batch_id,
                        error = %e,
                        "Job creation failed, skipping batch"
                    );
                    report.outcomes.push(BatchOutcome {
                        batch_id,
                        range,
                        kind: BatchOutcomeKind::SubmitFailed {
                            stage: SubmitStage::CreateJob,
                            error: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            let job = match self.processor.check_batch_job_status(&job.id, &cmd.poll).await {
                Ok(job) => job,
                Err(e) => {
                    let cancelled = matches!(e, ApplicationError::PollCancelled(_));
                    tracing::warn!(
                        batch_id = %batch_id,
                        job_id = %job.id,
                        error = %e,
                        "Polling stopped"
                    );
                    report.outcomes.push(BatchOutcome {
                        batch_id,
                        range,
                        kind: BatchOutcomeKind::PollFailed {
                            job_id: job.id,
                            error: e.to_string(),
                        },
                    });
                    if cancelled {
                        report.cancelled = true;
                        break;
                    }
                    continue;
                }
            };

            let kind = if cmd.save_outputs && job.downloadable_output().is_some() {
                match self.processor.save_job_output(&job).await {
                    Ok(path) => BatchOutcomeKind::Finished {
                        job,
                        output_path: Some(path),
                    },
                    Err(e) => {
                        tracing::error!(
                            batch_id = %batch_id,
                            job_id = %job.id,
                            error = %e,
                            "Failed to save batch output"
                        );
                        BatchOutcomeKind::OutputFailed {
                            job,
                            error: e.to_string(),
                        }
                    }
                }
            } else {
                if !job.status.is_success() {
                    tracing::warn!(
                        batch_id = %batch_id,
                        job_id = %job.id,
                        status = %job.status,
                        "Batch job did not complete, moving to the next batch"
                    );
                }
                BatchOutcomeKind::Finished {
                    job,
                    output_path: None,
                }
            };

            report.outcomes.push(BatchOutcome {
                batch_id,
                range,
                kind,
            });
        }

        tracing::info!(
            batches = report.outcomes.len(),
            completed = report.completed(),
            unsuccessful = report.unsuccessful(),
            cancelled = report.cancelled,
            "Batch run finished"
        );

        Ok(report)
    }
}
