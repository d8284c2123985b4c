//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod batch_provider;
mod batch_storage;

pub use batch_provider::{
    BatchProviderPort, CreateJobRequest, JobPage, ProviderError, ProviderKind,
};
pub use batch_storage::{BatchStorageError, BatchStoragePort};
