//! Batch Commands - 批次提交命令

use std::path::PathBuf;

use crate::application::poller::PollOptions;
use crate::domain::{BatchId, BatchRange, JobHandle};

/// 按批次提交任务列表的命令
#[derive(Debug, Clone)]
pub struct RunBatchesCommand {
    /// 起始任务下标（含）
    pub start_index: usize,
    /// 结束任务下标（不含），None 表示到列表末尾
    pub end_index: Option<usize>,
    /// 每批最多任务数
    pub batch_size: usize,
    pub poll: PollOptions,
    /// 作业成功后是否下载输出
    pub save_outputs: bool,
}

impl RunBatchesCommand {
    pub fn new(batch_size: usize, poll: PollOptions) -> Self {
        Self {
            start_index: 0,
            end_index: None,
            batch_size,
            poll,
            save_outputs: true,
        }
    }

    pub fn with_range(mut self, start_index: usize, end_index: Option<usize>) -> Self {
        self.start_index = start_index;
        self.end_index = end_index;
        self
    }
}

/// 提交阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    Upload,
    CreateJob,
}

/// 单个批次的结果
#[derive(Debug, Clone)]
pub enum BatchOutcomeKind {
    /// 空区间，未写文件也未上传
    Skipped { reason: String },
    /// 上传或建作业失败，继续下一批
    SubmitFailed { stage: SubmitStage, error: String },
    /// 轮询超时、取消或查询失败
    PollFailed { job_id: String, error: String },
    /// 到达终止状态；成功且已下载时带输出路径
    Finished {
        job: JobHandle,
        output_path: Option<PathBuf>,
    },
    /// 作业成功但输出下载/保存失败
    OutputFailed { job: JobHandle, error: String },
}

/// 批次结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub batch_id: BatchId,
    pub range: BatchRange,
    pub kind: BatchOutcomeKind,
}

/// 批次提交报告
#[derive(Debug, Clone, Default)]
pub struct RunBatchesReport {
    pub outcomes: Vec<BatchOutcome>,
    /// 是否因取消而提前结束
    pub cancelled: bool,
}

impl RunBatchesReport {
    /// 成功完成的批次数
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(&o.kind, BatchOutcomeKind::Finished { job, .. } if job.status.is_success())
            })
            .count()
    }

    /// 所有已保存的输出文件
    pub fn output_paths(&self) -> Vec<&PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.kind {
                BatchOutcomeKind::Finished {
                    output_path: Some(path),
                    ..
                } => Some(path),
                _ => None,
            })
            .collect()
    }

    /// 未成功完成的批次数（跳过、提交失败、轮询失败、终止于失败状态、输出失败）
    pub fn unsuccessful(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}
