//! 批次切分
//!
//! 将任务列表的 [start, end) 区间按批次大小切分为连续的子区间

use super::TaskError;

/// 任务列表中的一个连续区间 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    pub start: usize,
    pub end: usize,
}

impl BatchRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 切分 [start, end) 为最多 `batch_size` 个任务的连续批次
///
/// `end` 超过 `total` 时截断到 `total`。
/// `start == end` 时返回一个空区间，调用方据此报告跳过而不是静默忽略。
pub fn plan_batches(
    total: usize,
    start: usize,
    end: Option<usize>,
    batch_size: usize,
) -> Result<Vec<BatchRange>, TaskError> {
    if batch_size == 0 {
        return Err(TaskError::InvalidBatchSize(batch_size));
    }

    let end = end.unwrap_or(total).min(total);
    if start > end {
        return Err(TaskError::InvalidRange { start, end, total });
    }

    if start == end {
        return Ok(vec![BatchRange { start, end }]);
    }

    let ranges = (start..end)
        .step_by(batch_size)
        .map(|s| BatchRange {
            start: s,
            end: s.saturating_add(batch_size).min(end),
        })
        .collect();

    Ok(ranges)
}
