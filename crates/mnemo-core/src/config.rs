//! Memory manager configuration

use serde::{Deserialize, Serialize};

/// Configuration for one memory manager instance.
///
/// The token budget is per-instance state, not a global, so independent
/// managers with different budgets can coexist in one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum token cost allowed for the rendered active set.
    pub token_budget: usize,

    /// Number of most recent results protected from auto-compression.
    pub recency_window: usize,

    /// Truncation length for fallback summaries when the summarizer fails.
    pub fallback_summary_chars: usize,

    /// Maximum output characters forwarded to the summarizer.
    pub max_summary_input_chars: usize,

    /// Depth of the background summarization queue.
    pub summarizer_queue_depth: usize,

    /// Results larger than this get a warning marker on the dashboard.
    pub oversize_warning_tokens: usize,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self {
            token_budget: 100_000,
            recency_window: 5,
            fallback_summary_chars: 500,
            max_summary_input_chars: 10_000,
            summarizer_queue_depth: 16,
            oversize_warning_tokens: 5_000,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self::new()
    }
}
