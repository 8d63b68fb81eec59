//! Background summarization worker

use crate::fallback::fallback_summary;
use crate::summarizer::{Summarizer, SummaryRequest};
use mnemo_core::{TokenCounter, ToolId, ToolSummary};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

struct Job {
    id: ToolId,
    request: SummaryRequest,
    done: watch::Sender<Option<ToolSummary>>,
}

/// Bounded queue of summarization jobs with one in-flight request per
/// result and a per-result ready signal the compression path awaits.
///
/// Summarization failures never surface from the worker: it falls back to
/// a truncated-verbatim summary flagged `degraded`, so a waiter always
/// gets something compression can use.
pub struct SummaryWorker {
    tx: mpsc::Sender<Job>,
    slots: Arc<Mutex<HashMap<ToolId, watch::Receiver<Option<ToolSummary>>>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl SummaryWorker {
    pub fn spawn(
        summarizer: Arc<dyn Summarizer>,
        counter: Arc<dyn TokenCounter>,
        queue_depth: usize,
        fallback_chars: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<Job>(queue_depth.max(1));

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let summary = match summarizer.summarize(&job.request).await {
                    Ok(outcome) => outcome.into_summary(false, counter.as_ref()),
                    Err(e) => {
                        tracing::warn!(id = %job.id, error = %e, "summarization failed, using fallback");
                        fallback_summary(&job.request, fallback_chars)
                            .into_summary(true, counter.as_ref())
                    }
                };
                tracing::debug!(id = %job.id, tokens = summary.token_count, "summary ready");
                let _ = job.done.send(Some(summary));
            }
        });

        Self {
            tx,
            slots: Arc::new(Mutex::new(HashMap::new())),
            _handle: handle,
        }
    }

    /// Enqueue a summarization request. Returns false when the queue is
    /// full or a request for this result is already in flight; the caller
    /// then summarizes synchronously when it actually needs the summary.
    pub fn enqueue(&self, id: ToolId, request: SummaryRequest) -> bool {
        let mut slots = self.slots.lock().expect("worker slots poisoned");
        if slots.contains_key(&id) {
            return false;
        }
        let (done, ready) = watch::channel(None);
        match self.tx.try_send(Job { id, request, done }) {
            Ok(()) => {
                slots.insert(id, ready);
                true
            }
            Err(_) => false,
        }
    }

    /// Whether a request for this result is queued or in flight.
    pub fn pending(&self, id: ToolId) -> bool {
        self.slots
            .lock()
            .expect("worker slots poisoned")
            .contains_key(&id)
    }

    /// Wait for the ready signal and take the summary. Returns None if no
    /// request was in flight or the worker shut down.
    pub async fn wait(&self, id: ToolId) -> Option<ToolSummary> {
        let mut ready = {
            let slots = self.slots.lock().expect("worker slots poisoned");
            slots.get(&id)?.clone()
        };
        let summary = ready
            .wait_for(|value| value.is_some())
            .await
            .ok()?
            .clone()?;
        self.slots.lock().expect("worker slots poisoned").remove(&id);
        Some(summary)
    }

    /// Non-blocking variant of `wait`: take the summary only if finished.
    pub fn try_take(&self, id: ToolId) -> Option<ToolSummary> {
        let mut slots = self.slots.lock().expect("worker slots poisoned");
        let ready = slots.get(&id)?;
        let summary = ready.borrow().clone()?;
        slots.remove(&id);
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::StaticSummarizer;
    use mnemo_core::CharCounter;

    fn request(tool: &str, output: &str) -> SummaryRequest {
        SummaryRequest {
            tool_name: tool.to_string(),
            input: serde_json::json!({}),
            output: output.to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_wait() {
        let worker = SummaryWorker::spawn(
            Arc::new(StaticSummarizer::new().with_summary("grep", "Searched the tree")),
            Arc::new(CharCounter),
            4,
            500,
        );

        assert!(worker.enqueue(ToolId(1), request("grep", "many lines")));
        let summary = worker.wait(ToolId(1)).await.unwrap();
        assert_eq!(summary.text, "Searched the tree");
        assert!(!summary.degraded);

        // slot consumed
        assert!(worker.try_take(ToolId(1)).is_none());
    }

    #[tokio::test]
    async fn test_one_in_flight_per_result() {
        let worker = SummaryWorker::spawn(
            Arc::new(StaticSummarizer::new()),
            Arc::new(CharCounter),
            4,
            500,
        );

        assert!(worker.enqueue(ToolId(1), request("a", "x")));
        assert!(!worker.enqueue(ToolId(1), request("a", "x")));
    }

    #[tokio::test]
    async fn test_failure_falls_back_degraded() {
        let worker = SummaryWorker::spawn(
            Arc::new(StaticSummarizer::failing()),
            Arc::new(CharCounter),
            4,
            500,
        );

        assert!(worker.enqueue(ToolId(3), request("execute_command", "Plan: 5 to add")));
        let summary = worker.wait(ToolId(3)).await.unwrap();
        assert!(summary.degraded);
        assert!(summary.text.contains("Plan: 5 to add"));
    }

    #[tokio::test]
    async fn test_wait_without_enqueue() {
        let worker = SummaryWorker::spawn(
            Arc::new(StaticSummarizer::new()),
            Arc::new(CharCounter),
            4,
            500,
        );
        assert!(worker.wait(ToolId(9)).await.is_none());
    }
}
