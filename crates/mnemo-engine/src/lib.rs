//! Compression/expansion engine and memory orchestration

mod active;
mod compress;
mod dashboard;
mod expand;
mod manager;

pub use active::{active_set, ActiveEntry};
pub use compress::{CompressOutcome, CompressionEngine, CompressionReport};
pub use dashboard::{total_active_tokens, DashboardRenderer};
pub use expand::ExpansionSelector;
pub use manager::{MemoryManager, RecordOutcome};
