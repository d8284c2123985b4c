//! 应用层 - 查询（读操作）
//!
//! 作业状态与输出收集

mod job_queries;

pub mod handlers;

pub use job_queries::*;
