//! Deterministic dashboard rendering
//!
//! The dashboard is the agent's only view of memory, so the token figure
//! shown in each header is computed by the TokenCounter over the exact
//! block body (the lines below the header). `total_active_tokens` sums
//! the same figures; rendering and accounting cannot drift apart.

use crate::active::{active_set, ActiveEntry};
use mnemo_core::{Group, MemoryConfig, Result, TokenCounter, ToolResult, ToolSummary};
use mnemo_store::ResultStore;
use std::sync::Arc;

pub const DASHBOARD_HEADER: &str = "=== ACTIVE TOOL RESULTS ===";

/// Body of a verbatim (FULL/EXPANDED) block. A failed result carries an
/// error payload, so its last line is labelled `Error:` instead of
/// `Output:`.
pub fn full_block_body(record: &ToolResult) -> String {
    let payload_label = match record.status {
        mnemo_core::ToolStatus::Success => "Output",
        mnemo_core::ToolStatus::Failure => "Error",
    };
    format!(
        "Input: {}\nResult: {}\n{}: {}",
        record.input,
        record.status.as_str(),
        payload_label,
        record.output
    )
}

/// Body of a standalone compressed block: the summary stands in for the
/// output, with salient facts appended in parentheses.
pub fn compressed_block_body(record: &ToolResult) -> String {
    let summary = record
        .summary
        .as_ref()
        .map(summary_with_facts)
        .unwrap_or_else(|| "Summary not available".to_string());
    format!(
        "Input: {}\nResult: {}\nOutput: {}",
        record.input,
        record.status.as_str(),
        summary
    )
}

/// Body of a compressed group block.
pub fn group_block_body(group: &Group) -> String {
    let members: Vec<String> = group.member_ids.iter().map(|m| m.to_string()).collect();
    format!(
        "Members: {}\nOutput: {}",
        members.join(", "),
        group.combined_summary
    )
}

/// Summary text with salient facts as `(key: value, ...)`, long values
/// truncated at 50 chars.
pub fn summary_with_facts(summary: &ToolSummary) -> String {
    if summary.salient_facts.is_empty() {
        return summary.text.clone();
    }
    let parts: Vec<String> = summary
        .salient_facts
        .iter()
        .map(|(key, value)| {
            let shown = if value.len() > 50 {
                format!("{}...", truncate_boundary(value, 50))
            } else {
                value.clone()
            };
            format!("{}: {}", key, shown)
        })
        .collect();
    format!("{} ({})", summary.text, parts.join(", "))
}

fn truncate_boundary(s: &str, max: usize) -> &str {
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Rendered body and token cost of one active entry.
pub fn entry_body(entry: &ActiveEntry) -> String {
    match entry {
        ActiveEntry::Result(r) if r.is_verbatim() => full_block_body(r),
        ActiveEntry::Result(r) => compressed_block_body(r),
        ActiveEntry::Group(g) => group_block_body(g),
    }
}

/// Token cost of the rendered active set.
pub fn total_active_tokens(store: &dyn ResultStore, counter: &dyn TokenCounter) -> Result<usize> {
    let mut total = 0;
    for entry in active_set(store)? {
        total += counter.count(&entry_body(&entry));
    }
    Ok(total)
}

/// Renders the active memory set into the fixed textual format the agent
/// reads each turn.
pub struct DashboardRenderer {
    counter: Arc<dyn TokenCounter>,
    config: MemoryConfig,
}

impl DashboardRenderer {
    pub fn new(counter: Arc<dyn TokenCounter>, config: MemoryConfig) -> Self {
        Self { counter, config }
    }

    pub fn render(&self, entries: &[ActiveEntry]) -> String {
        if entries.is_empty() {
            return format!("{}\nNo tool results yet.", DASHBOARD_HEADER);
        }

        let mut lines = vec![DASHBOARD_HEADER.to_string()];
        let mut total_tokens = 0;

        for entry in entries {
            let body = entry_body(entry);
            let tokens = self.counter.count(&body);
            total_tokens += tokens;
            lines.push(self.header_line(entry, tokens));
            lines.push(body);
            lines.push(String::new());
        }

        let budget = self.config.token_budget;
        // a zero budget means any usage saturates the gauge
        let usage = if budget == 0 {
            100.0
        } else {
            (total_tokens as f64 / budget as f64) * 100.0
        };
        lines.push(format!(
            "Token Usage: {} / {} ({:.1}%)",
            thousands(total_tokens),
            thousands(budget),
            usage
        ));

        lines.join("\n")
    }

    fn header_line(&self, entry: &ActiveEntry, tokens: usize) -> String {
        match entry {
            ActiveEntry::Result(r) => {
                let warn = if r.status == mnemo_core::ToolStatus::Failure
                    || tokens > self.config.oversize_warning_tokens
                {
                    " [!]"
                } else {
                    ""
                };
                let compressed = if r.is_compressed() { " [COMPRESSED]" } else { "" };
                format!(
                    "[{}] {} - {} ({} tokens){}{}",
                    r.id,
                    r.tool_name,
                    r.status.label(),
                    thousands(tokens),
                    warn,
                    compressed
                )
            }
            ActiveEntry::Group(g) => format!(
                "[{}] Group - COMPRESSED ({} tokens) [COMPRESSED]",
                g.id,
                thousands(tokens)
            ),
        }
    }
}

/// `1234567` -> `1,234,567`.
fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
