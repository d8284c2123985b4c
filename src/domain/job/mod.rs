//! Job Context - vendor 批处理作业
//!
//! 职责:
//! - 作业状态机（排队 → 运行 → 终止）
//! - 上传文件与作业句柄

mod value_objects;

pub use value_objects::{FileHandle, JobHandle, JobList, JobStatus, RequestCounts};
