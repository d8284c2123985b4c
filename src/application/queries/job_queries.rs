//! Job Queries - 作业相关查询

/// 单次查询作业状态（不轮询）
#[derive(Debug, Clone)]
pub struct GetJob {
    pub job_id: String,
}

/// 遍历 vendor 作业列表并保存已完成作业的输出
///
/// vendor 的列表接口会返回历史上所有作业，`stop_at_job_id` 用于
/// 在遇到已知作业时停止（不含该作业）
#[derive(Debug, Clone)]
pub struct CollectOutputs {
    pub stop_at_job_id: Option<String>,
    pub page_size: u32,
    /// 最多检查的作业数
    pub max_jobs: Option<usize>,
}

impl Default for CollectOutputs {
    fn default() -> Self {
        Self {
            stop_at_job_id: None,
            page_size: 100,
            max_jobs: None,
        }
    }
}
