//! Truncated-verbatim fallback when the summarizer is unavailable

use crate::summarizer::{SummaryOutcome, SummaryRequest};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:[A-Za-z0-9_@-]+/)*[A-Za-z0-9_@-]+\.[A-Za-z]{1,5}\b").unwrap()
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?:https?://|arn:)[^\s"')]+"#).unwrap())
}

/// Build a degraded summary from the raw output: the first `max_chars`
/// verbatim, plus whatever concrete identifiers (paths, URLs, ARNs) a
/// cheap regex pass can pull out as salient facts.
pub fn fallback_summary(request: &SummaryRequest, max_chars: usize) -> SummaryOutcome {
    let truncated = truncate_chars(&request.output, max_chars);
    let text = if truncated.len() < request.output.len() {
        format!("[{}] {}...", request.tool_name, truncated)
    } else {
        format!("[{}] {}", request.tool_name, truncated)
    };

    let mut salient_facts = BTreeMap::new();
    let mut seen = Vec::new();
    for (prefix, re) in [("path", path_re()), ("ref", url_re())] {
        let mut n = 0;
        for m in re.find_iter(&request.output) {
            let found = m.as_str().to_string();
            if seen.contains(&found) {
                continue;
            }
            n += 1;
            if n > 5 {
                break;
            }
            salient_facts.insert(format!("{}_{}", prefix, n), found.clone());
            seen.push(found);
        }
    }

    SummaryOutcome {
        text,
        salient_facts,
    }
}

/// Longest prefix of at most `max` bytes that ends on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(output: &str) -> SummaryRequest {
        SummaryRequest {
            tool_name: "execute_command".to_string(),
            input: serde_json::json!({"command": "terraform plan"}),
            output: output.to_string(),
        }
    }

    #[test]
    fn test_short_output_kept_verbatim() {
        let outcome = fallback_summary(&request("Plan: 5 to add"), 500);
        assert_eq!(outcome.text, "[execute_command] Plan: 5 to add");
    }

    #[test]
    fn test_long_output_truncated() {
        let long = "x".repeat(2_000);
        let outcome = fallback_summary(&request(&long), 500);
        assert!(outcome.text.ends_with("..."));
        assert!(outcome.text.len() < 600);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let s = format!("{}é", "a".repeat(499));
        let outcome = fallback_summary(&request(&s), 500);
        assert!(outcome.text.ends_with("..."));
    }

    #[test]
    fn test_salient_fact_extraction() {
        let outcome = fallback_summary(
            &request("Modified main.tf and src/web.tf, see https://console.aws.example/stack"),
            500,
        );
        let facts: Vec<&str> = outcome.salient_facts.values().map(|s| s.as_str()).collect();
        assert!(facts.contains(&"main.tf"));
        assert!(facts.contains(&"src/web.tf"));
        assert!(facts.iter().any(|f| f.starts_with("https://")));
    }

    #[test]
    fn test_duplicate_facts_collapsed() {
        let outcome = fallback_summary(&request("main.tf main.tf main.tf"), 500);
        assert_eq!(outcome.salient_facts.len(), 1);
    }
}
