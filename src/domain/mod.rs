//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Task Context: 推理任务构建与批次切分
//! - Job Context: vendor 作业状态与文件句柄

pub mod job;
pub mod task;

pub use job::{FileHandle, JobHandle, JobList, JobStatus, RequestCounts};
pub use task::{
    build_tasks, plan_batches, BatchId, BatchRange, ChatMessage, GenerationParameters, Role,
    Task, TaskError, TaskId,
};
