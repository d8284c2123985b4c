//! 应用层 - 命令（写操作）
//!
//! 批次提交：写批次文件、上传、建作业、轮询、保存输出

mod batch_commands;

pub mod handlers;

pub use batch_commands::*;
