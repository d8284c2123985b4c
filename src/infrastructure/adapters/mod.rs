//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod providers;
pub mod storage;

pub use providers::*;
pub use storage::*;
