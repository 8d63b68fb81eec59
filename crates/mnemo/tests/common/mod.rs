use mnemo_core::{CharCounter, MemoryConfig, ToolId, ToolStatus};
use mnemo_engine::MemoryManager;
use mnemo_store::MemStore;
use mnemo_summarize::StaticSummarizer;
use std::sync::Arc;

/// Manager over an in-memory store with the fixed-ratio counter and a
/// deterministic summarizer, so every token figure in these tests is
/// reproducible.
pub fn manager(budget: usize, recency_window: usize) -> MemoryManager {
    MemoryManager::new(
        Box::new(MemStore::new()),
        MemoryConfig {
            token_budget: budget,
            recency_window,
            ..MemoryConfig::new()
        },
        Arc::new(CharCounter),
        Arc::new(
            StaticSummarizer::new()
                .with_summary("execute_command", "Ran a shell command")
                .with_summary("read_file", "Read one file"),
        ),
    )
}

pub async fn record(m: &mut MemoryManager, tool: &str, output: &str) -> ToolId {
    m.record(
        tool,
        serde_json::json!({"target": tool}),
        output.to_string(),
        ToolStatus::Success,
        &[],
    )
    .await
    .unwrap()
    .id
}
