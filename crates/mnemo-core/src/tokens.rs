//! Token counting seam and heuristic estimator

/// Deterministic text-to-token-cost collaborator.
///
/// Implementations must return the same count for identical input; the
/// dashboard's displayed figures are computed through this trait so
/// rendering and accounting never drift apart.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Heuristic BPE estimator based on content type detection:
/// code-heavy ~2.5 chars/token, markdown ~3.0, natural language ~4.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCounter;

impl TokenCounter for HeuristicCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let total_chars = text.len();
        let total_lines = text.lines().count().max(1);

        let code_chars = text
            .chars()
            .filter(|&c| "{}[]();=<>|&!@#$%^*~`\\".contains(c))
            .count();
        let md_chars = text.chars().filter(|&c| "#-*_>".contains(c)).count();

        let indent_lines = text
            .lines()
            .filter(|line| line.starts_with("    ") || line.starts_with('\t'))
            .count();
        let indent_ratio = indent_lines as f64 / total_lines as f64;

        let code_fraction =
            ((code_chars as f64 / total_chars as f64) * 10.0 + indent_ratio * 0.5).min(1.0);
        let md_fraction = ((md_chars as f64 / total_chars as f64) * 8.0).min(1.0 - code_fraction);
        let prose_fraction = 1.0 - code_fraction - md_fraction;

        let chars_per_token = code_fraction * 2.5 + md_fraction * 3.0 + prose_fraction * 4.0;

        (total_chars as f64 / chars_per_token).max(1.0) as usize
    }
}

/// Fixed-ratio counter (4 chars per token, rounded up). Deterministic and
/// easy to reason about in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCounter;

impl TokenCounter for CharCounter {
    fn count(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_empty() {
        assert_eq!(HeuristicCounter.count(""), 0);
    }

    #[test]
    fn test_heuristic_code() {
        let code = "fn main() {\n    println!(\"Hello\");\n}";
        let tokens = HeuristicCounter.count(code);
        assert!((12..=20).contains(&tokens), "Got {}", tokens);
    }

    #[test]
    fn test_heuristic_prose() {
        let prose = "This is a simple sentence with natural language that should be counted at about four characters per token.";
        let tokens = HeuristicCounter.count(prose);
        assert!((20..=32).contains(&tokens), "Got {}", tokens);
    }

    #[test]
    fn test_heuristic_deterministic() {
        let text = "Input: {\"command\": \"terraform plan\"}\nOutput: Plan: 5 to add";
        assert_eq!(HeuristicCounter.count(text), HeuristicCounter.count(text));
    }

    #[test]
    fn test_char_counter() {
        assert_eq!(CharCounter.count(""), 0);
        assert_eq!(CharCounter.count("abcd"), 1);
        assert_eq!(CharCounter.count("abcde"), 2);
    }
}
