//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现：
//! - adapters/providers: OpenAI、Mistral 与内存 vendor
//! - adapters/storage: 本地 JSONL 文件存储

pub mod adapters;

pub use adapters::{
    build_provider, FakeBatchProvider, FileBatchStorage, MistralBatchClient, OpenAiBatchClient,
    StorageLayout, VendorClientConfig,
};
