//! LLM-backed summarizer over the Anthropic messages API

use crate::fallback::fallback_summary;
use crate::summarizer::{Summarizer, SummaryOutcome, SummaryRequest};
use async_trait::async_trait;
use mnemo_core::{MemoryError, Result};
use std::collections::BTreeMap;

const SUMMARY_MODEL: &str = "claude-3-haiku-20240307";
const MAX_INPUT_CHARS: usize = 10_000;

/// Build the summarization prompt for one tool execution.
pub fn build_summary_prompt(request: &SummaryRequest) -> String {
    let output = if request.output.len() > MAX_INPUT_CHARS {
        &request.output[..floor_boundary(&request.output, MAX_INPUT_CHARS)]
    } else {
        &request.output
    };
    format!(
        "You are analyzing the result of a {tool} tool execution for an agent's \
         memory dashboard. Summarize what the tool did and what happened in 2-3 \
         sentences, then extract the concrete data points a later step might need \
         (file paths, resource ids, URLs, counts). Return JSON only:\n\
         {{\"summary\": \"<2-3 sentence summary>\", \"salient_facts\": {{\"<key>\": \"<value>\", ...}}}}\n\n\
         Input parameters:\n{input}\n\nOutput:\n{output}",
        tool = request.tool_name,
        input = request.input,
        output = output,
    )
}

fn floor_boundary(s: &str, max: usize) -> usize {
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Summarizer backed by a hosted model. Failures surface as
/// `MemoryError::Summarization`; the caller applies the fallback.
pub struct ApiSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl ApiSummarizer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: SUMMARY_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Summarizer for ApiSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryOutcome> {
        let prompt = build_summary_prompt(request);

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": prompt}]
            }))
            .send()
            .await
            .map_err(|e| MemoryError::Summarization(e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MemoryError::Summarization(e.to_string()))?;
        let text = body["content"][0]["text"].as_str().unwrap_or("");

        match serde_json::from_str::<serde_json::Value>(extract_json(text)) {
            Ok(parsed) => {
                let summary = parsed["summary"].as_str().unwrap_or(text).to_string();
                let salient_facts = parsed["salient_facts"]
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| {
                                let value = match v.as_str() {
                                    Some(s) => s.to_string(),
                                    None => v.to_string(),
                                };
                                (k.clone(), value)
                            })
                            .collect()
                    })
                    .unwrap_or_else(BTreeMap::new);
                Ok(SummaryOutcome {
                    text: summary,
                    salient_facts,
                })
            }
            // Model returned prose instead of JSON: degrade to truncation
            // rather than fail the whole request.
            Err(_) => Ok(fallback_summary(request, 500)),
        }
    }
}

/// Slice from the first `{` to the last `}` so leading/trailing prose
/// around the JSON object does not break parsing.
fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}
