//! External tools (`git`, `patch`).

pub mod command_builder;

pub use command_builder::{ToolCommand, ToolOutput};
