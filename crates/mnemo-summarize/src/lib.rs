//! Summarization collaborator: trait, LLM client, fallback, worker

mod api;
mod fallback;
mod summarizer;
mod worker;

pub use api::{build_summary_prompt, ApiSummarizer};
pub use fallback::fallback_summary;
pub use summarizer::{StaticSummarizer, Summarizer, SummaryOutcome, SummaryRequest};
pub use worker::SummaryWorker;
