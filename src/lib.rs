//! batchrun - OpenAI / Mistral 批处理推理客户端
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Task Context: 任务、消息、生成参数、批次划分
//! - Job Context: 作业状态、文件句柄
//!
//! 应用层 (application/):
//! - Ports: 端口定义（BatchProvider, BatchStorage）
//! - Processor: 任务文件 → 上传 → 建作业 → 轮询 → 保存输出
//! - Commands: 批次循环
//! - Queries: 作业查询、输出收集
//!
//! 基础设施层 (infrastructure/):
//! - Providers: OpenAI、Mistral HTTP 客户端及内存实现
//! - Storage: JSONL 文件存储

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
