//! Command Handlers 实现

mod batch_command_handlers;

pub use batch_command_handlers::*;
