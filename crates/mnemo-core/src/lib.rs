//! Core types for tool-result memory management

mod config;
mod error;
mod tokens;
mod types;

pub use config::MemoryConfig;
pub use error::{MemoryError, Result};
pub use tokens::{CharCounter, HeuristicCounter, TokenCounter};
pub use types::{
    Group, GroupId, RelationKind, ResultState, ToolId, ToolResult, ToolStatus, ToolSummary,
};
