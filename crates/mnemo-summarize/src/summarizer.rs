//! Summarizer contract and test double

use async_trait::async_trait;
use mnemo_core::{MemoryError, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// What the summarizer sees of a tool execution.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRequest {
    pub tool_name: String,
    pub input: serde_json::Value,
    pub output: String,
}

/// Natural-language summary plus extracted salient facts.
#[derive(Debug, Clone, Default)]
pub struct SummaryOutcome {
    pub text: String,
    pub salient_facts: BTreeMap<String, String>,
}

impl SummaryOutcome {
    /// Materialize as a stored summary, pricing the text plus rendered
    /// salient facts through the given counter.
    pub fn into_summary(
        self,
        degraded: bool,
        counter: &dyn mnemo_core::TokenCounter,
    ) -> mnemo_core::ToolSummary {
        let mut priced = self.text.clone();
        for (key, value) in &self.salient_facts {
            priced.push_str(&format!(" {}: {}", key, value));
        }
        mnemo_core::ToolSummary {
            text: self.text,
            salient_facts: self.salient_facts,
            token_count: counter.count(&priced),
            degraded,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Summarization collaborator. May fail or time out; callers recover with
/// the truncated-verbatim fallback.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryOutcome>;
}

/// Deterministic summarizer for tests: a fixed template, optionally
/// per-tool overrides, optionally always failing.
#[derive(Debug, Default)]
pub struct StaticSummarizer {
    overrides: BTreeMap<String, String>,
    fail: bool,
}

impl StaticSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed summary text for a given tool name.
    pub fn with_summary(mut self, tool_name: &str, text: &str) -> Self {
        self.overrides
            .insert(tool_name.to_string(), text.to_string());
        self
    }

    /// Always return a `Summarization` error (fallback-path tests).
    pub fn failing() -> Self {
        Self {
            overrides: BTreeMap::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl Summarizer for StaticSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryOutcome> {
        if self.fail {
            return Err(MemoryError::Summarization("static failure".to_string()));
        }
        let text = self
            .overrides
            .get(&request.tool_name)
            .cloned()
            .unwrap_or_else(|| format!("Ran {} and captured its output", request.tool_name));
        Ok(SummaryOutcome {
            text,
            salient_facts: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(tool: &str) -> SummaryRequest {
        SummaryRequest {
            tool_name: tool.to_string(),
            input: serde_json::json!({}),
            output: "out".to_string(),
        }
    }

    #[tokio::test]
    async fn test_static_summarizer_template_and_override() {
        let summarizer = StaticSummarizer::new().with_summary("read_file", "Read a file");

        let outcome = summarizer.summarize(&request("read_file")).await.unwrap();
        assert_eq!(outcome.text, "Read a file");

        let outcome = summarizer.summarize(&request("grep")).await.unwrap();
        assert!(outcome.text.contains("grep"));
    }

    #[tokio::test]
    async fn test_static_summarizer_failing() {
        let summarizer = StaticSummarizer::failing();
        assert!(summarizer.summarize(&request("x")).await.is_err());
    }
}
