//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（BatchProvider、BatchStorage）
//! - processor: 批处理生命周期的七个操作
//! - poller: 作业状态轮询
//! - commands: 批次提交命令及处理器
//! - queries: 作业查询及输出收集
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod poller;
pub mod ports;
pub mod processor;
pub mod queries;

// Re-exports
pub use commands::{
    handlers::RunBatchesHandler, BatchOutcome, BatchOutcomeKind, RunBatchesCommand,
    RunBatchesReport, SubmitStage,
};

pub use error::ApplicationError;

pub use poller::{poll_until_terminal, PollOptions};

pub use ports::{
    BatchProviderPort, BatchStorageError, BatchStoragePort, CreateJobRequest, JobPage,
    ProviderError, ProviderKind,
};

pub use processor::{BatchProcessor, ProcessorSettings};

pub use queries::{
    handlers::{CollectOutputsHandler, CollectOutputsResponse, CollectedJob, GetJobHandler},
    CollectOutputs, GetJob,
};
