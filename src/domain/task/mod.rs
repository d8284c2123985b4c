//! Task Context - 推理任务限界上下文
//!
//! 职责:
//! - 任务构建（id + 消息 + 生成参数）
//! - 批次标识
//! - 批次切分

mod batching;
mod entities;
mod errors;
mod value_objects;

pub use batching::{plan_batches, BatchRange};
pub use entities::{build_tasks, ChatMessage, GenerationParameters, Role, Task};
pub use errors::TaskError;
pub use value_objects::{BatchId, TaskId};
