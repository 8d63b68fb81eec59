//! Memory manager: the single owner of the store and the agent-facing
//! surface
//!
//! All mutation funnels through `&mut self`, so a manager is the single
//! writer for its store by construction.

use crate::active::active_set;
use crate::compress::{CompressOutcome, CompressionEngine, CompressionReport};
use crate::dashboard::{full_block_body, total_active_tokens, DashboardRenderer};
use crate::expand::ExpansionSelector;
use mnemo_core::{
    GroupId, MemoryConfig, MemoryError, RelationKind, Result, TokenCounter, ToolId, ToolResult,
    ToolStatus,
};
use mnemo_store::ResultStore;
use mnemo_summarize::{fallback_summary, SummaryRequest, SummaryWorker, Summarizer};
use std::sync::Arc;

/// What `record` did beyond storing the result.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub id: ToolId,
    /// Present when recording pushed the active set over budget and an
    /// auto-compression run was triggered.
    pub report: Option<CompressionReport>,
}

pub struct MemoryManager {
    store: Box<dyn ResultStore>,
    config: MemoryConfig,
    counter: Arc<dyn TokenCounter>,
    summarizer: Arc<dyn Summarizer>,
    worker: Option<SummaryWorker>,
    engine: CompressionEngine,
    selector: ExpansionSelector,
    renderer: DashboardRenderer,
}

impl MemoryManager {
    pub fn new(
        store: Box<dyn ResultStore>,
        config: MemoryConfig,
        counter: Arc<dyn TokenCounter>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            engine: CompressionEngine::new(counter.clone(), config.clone()),
            selector: ExpansionSelector::new(counter.clone()),
            renderer: DashboardRenderer::new(counter.clone(), config.clone()),
            store,
            counter,
            summarizer,
            worker: None,
            config,
        }
    }

    /// Start the background summarization worker. Requires a running
    /// tokio runtime; without it every summary is produced synchronously
    /// at compression time.
    pub fn start_worker(&mut self) {
        self.worker = Some(SummaryWorker::spawn(
            self.summarizer.clone(),
            self.counter.clone(),
            self.config.summarizer_queue_depth,
            self.config.fallback_summary_chars,
        ));
    }

    /// Record one tool execution verbatim, persist its relationship edges,
    /// enqueue its summarization, and auto-compress if the rendered active
    /// set went over budget.
    pub async fn record(
        &mut self,
        tool_name: &str,
        input: serde_json::Value,
        output: String,
        status: ToolStatus,
        relationships: &[(ToolId, RelationKind)],
    ) -> Result<RecordOutcome> {
        let seq = self.store.next_tool_seq()?;
        let id = ToolId(seq);
        let mut record = ToolResult {
            id,
            tool_name: tool_name.to_string(),
            input,
            output,
            status,
            created_at: seq,
            timestamp: chrono::Utc::now(),
            full_token_count: 0,
            summary: None,
            state: mnemo_core::ResultState::Full,
            group_id: None,
        };
        record.full_token_count = self.counter.count(&full_block_body(&record));

        let request = self.summary_request(&record);
        let params = brief_params(&record.input);
        self.store.append(record)?;
        for &(other, kind) in relationships {
            self.store.add_relationship(id, other, kind)?;
        }
        tracing::info!(%id, tool = tool_name, %params, "recorded tool result");

        if let Some(worker) = &self.worker {
            worker.enqueue(id, request);
        }

        let report = self.enforce_budget().await?;
        Ok(RecordOutcome { id, report })
    }

    /// Record a typed edge between two results. Idempotent.
    pub fn relate(&mut self, src: &str, dst: &str, kind: RelationKind) -> Result<()> {
        let src = parse_tool_id(src)?;
        let dst = parse_tool_id(dst)?;
        self.store.add_relationship(src, dst, kind)
    }

    /// Compress the named results, grouping them when several are given.
    /// Summaries are awaited from the worker or produced synchronously.
    pub async fn compress_tool_results(&mut self, ids: &[&str]) -> Result<CompressOutcome> {
        let mut parsed = Vec::with_capacity(ids.len());
        for raw in ids {
            parsed.push(parse_tool_id(raw)?);
        }
        for &id in &parsed {
            self.ensure_summary(id).await?;
        }
        self.engine.compress(self.store.as_mut(), &parsed)
    }

    /// Expand a result (`TR-n`) or a whole group (`G-n`) back to verbatim.
    /// Returns the ids now shown in full.
    pub async fn expand_tool_result(&mut self, id: &str) -> Result<Vec<ToolId>> {
        if let Some(gid) = GroupId::parse(id) {
            return self.selector.expand_group(self.store.as_mut(), gid);
        }
        let tool_id = parse_tool_id(id)?;
        let record = self.selector.expand(self.store.as_mut(), tool_id)?;
        Ok(vec![record.id])
    }

    /// Fetch one result verbatim without changing its state. Peeking is
    /// free; only `expand_tool_result` moves a result back onto the
    /// dashboard.
    pub fn get_tool_result(&self, id: &str) -> Result<ToolResult> {
        self.store.get(parse_tool_id(id)?)
    }

    /// Compressed results whose summaries overlap the query, best first.
    pub fn suggest_expansions(&self, query: &str, limit: usize) -> Result<Vec<(ToolId, f64)>> {
        self.selector
            .suggest_candidates(self.store.as_ref(), query, limit)
    }

    /// Render the dashboard for this turn.
    pub fn dashboard(&self) -> Result<String> {
        let entries = active_set(self.store.as_ref())?;
        Ok(self.renderer.render(&entries))
    }

    pub fn total_active_tokens(&self) -> Result<usize> {
        total_active_tokens(self.store.as_ref(), self.counter.as_ref())
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Attach any summaries the worker has finished since the last call.
    /// Returns how many were attached.
    pub fn drain_ready(&mut self) -> Result<usize> {
        let Some(worker) = &self.worker else {
            return Ok(0);
        };
        let mut attached = 0;
        for record in self.store.list()? {
            if record.summary.is_some() {
                continue;
            }
            if let Some(summary) = worker.try_take(record.id) {
                self.store.attach_summary(record.id, summary)?;
                attached += 1;
            }
        }
        Ok(attached)
    }

    /// Guarantee the result has a summary: take the worker's if one is in
    /// flight, otherwise summarize now, degrading to the truncated
    /// fallback on failure.
    async fn ensure_summary(&mut self, id: ToolId) -> Result<()> {
        let record = self.store.get(id)?;
        if record.summary.is_some() {
            return Ok(());
        }

        if let Some(worker) = &self.worker {
            if worker.pending(id) {
                if let Some(summary) = worker.wait(id).await {
                    return self.store.attach_summary(id, summary);
                }
            }
        }

        let request = self.summary_request(&record);
        let summary = match self.summarizer.summarize(&request).await {
            Ok(outcome) => outcome.into_summary(false, self.counter.as_ref()),
            Err(e) => {
                tracing::warn!(%id, error = %e, "summarization failed, using fallback");
                fallback_summary(&request, self.config.fallback_summary_chars)
                    .into_summary(true, self.counter.as_ref())
            }
        };
        self.store.attach_summary(id, summary)
    }

    /// When over budget, summarize the compressible candidates and run
    /// auto-compression. Going over budget is reported, never an error.
    async fn enforce_budget(&mut self) -> Result<Option<CompressionReport>> {
        self.drain_ready()?;
        if self.total_active_tokens()? <= self.config.token_budget {
            return Ok(None);
        }

        let records = self.store.list()?;
        let eligible = records.len().saturating_sub(self.config.recency_window);
        let candidates: Vec<ToolId> = records
            .iter()
            .take(eligible)
            .filter(|r| !r.is_compressed() && r.summary.is_none())
            .map(|r| r.id)
            .collect();
        for id in candidates {
            self.ensure_summary(id).await?;
        }

        let report = self
            .engine
            .auto_compress(self.store.as_mut(), self.config.token_budget)?;
        if report.over_budget {
            tracing::warn!(
                tokens = report.final_tokens,
                budget = self.config.token_budget,
                "active set still over budget after compression"
            );
        }
        Ok(Some(report))
    }

    fn summary_request(&self, record: &ToolResult) -> SummaryRequest {
        SummaryRequest {
            tool_name: record.tool_name.clone(),
            input: record.input.clone(),
            output: head_chars(&record.output, self.config.max_summary_input_chars).to_string(),
        }
    }
}

fn parse_tool_id(raw: &str) -> Result<ToolId> {
    ToolId::parse(raw).ok_or_else(|| MemoryError::MalformedId(raw.to_string()))
}

/// One-line description of a tool's input for log lines: the value of a
/// well-known parameter key when present, otherwise the truncated JSON.
fn brief_params(input: &serde_json::Value) -> String {
    if let Some(map) = input.as_object() {
        for key in ["command", "file_path", "query"] {
            if let Some(value) = map.get(key).and_then(|v| v.as_str()) {
                return value.to_string();
            }
        }
        if let Some(code) = map.get("code") {
            return format!("code modification ({} chars)", code.to_string().len());
        }
    }
    let raw = input.to_string();
    if raw.len() > 50 {
        format!("{}...", head_chars(&raw, 50))
    } else {
        raw
    }
}

fn head_chars(s: &str, max: usize) -> &str {
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
    use mnemo_core::{CharCounter, ResultState};
    use mnemo_store::MemStore;
    use mnemo_summarize::StaticSummarizer;

    fn manager(budget: usize, recency_window: usize) -> MemoryManager {
        MemoryManager::new(
            Box::new(MemStore::new()),
            MemoryConfig {
                token_budget: budget,
                recency_window,
                ..MemoryConfig::new()
            },
            Arc::new(CharCounter),
            Arc::new(StaticSummarizer::new()),
        )
    }

    async fn record(m: &mut MemoryManager, tool: &str, output_len: usize) -> ToolId {
        m.record(
            tool,
            serde_json::json!({"command": "ls"}),
            "x".repeat(output_len),
            ToolStatus::Success,
            &[],
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_record_assigns_sequential_ids() {
        let mut m = manager(100_000, 5);
        assert_eq!(record(&mut m, "a", 10).await, ToolId(1));
        assert_eq!(record(&mut m, "b", 10).await, ToolId(2));
        assert!(m.dashboard().unwrap().contains("[TR-1]"));
    }

    #[tokio::test]
    async fn test_over_budget_triggers_auto_compress() {
        let mut m = manager(1_200, 1);
        for _ in 0..4 {
            record(&mut m, "execute_command", 2000).await;
        }

        assert!(m.total_active_tokens().unwrap() <= 1_200);
        // newest result protected
        let newest = m.get_tool_result("TR-4").unwrap();
        assert_eq!(newest.state, ResultState::Full);
        let oldest = m.get_tool_result("TR-1").unwrap();
        assert!(oldest.is_compressed());
    }

    #[tokio::test]
    async fn test_get_tool_result_is_side_effect_free() {
        let mut m = manager(100_000, 5);
        record(&mut m, "a", 2000).await;
        m.compress_tool_results(&["TR-1"]).await.unwrap();

        let before = m.dashboard().unwrap();
        let fetched = m.get_tool_result("TR-1").unwrap();
        assert_eq!(fetched.output.len(), 2000);
        assert!(fetched.is_compressed());
        assert_eq!(m.dashboard().unwrap(), before);
    }

    #[tokio::test]
    async fn test_compress_then_expand_round_trip() {
        let mut m = manager(100_000, 5);
        record(&mut m, "read_file", 3000).await;

        m.compress_tool_results(&["TR-1"]).await.unwrap();
        assert!(m.dashboard().unwrap().contains("[COMPRESSED]"));

        let expanded = m.expand_tool_result("TR-1").await.unwrap();
        assert_eq!(expanded, vec![ToolId(1)]);
        let rec = m.get_tool_result("TR-1").unwrap();
        assert_eq!(rec.state, ResultState::Expanded);
        assert!(!m.dashboard().unwrap().contains("[COMPRESSED]"));
    }

    #[tokio::test]
    async fn test_expand_whole_group() {
        let mut m = manager(100_000, 5);
        record(&mut m, "execute_command", 2000).await;
        record(&mut m, "execute_command", 2000).await;

        let outcome = m
            .compress_tool_results(&["TR-1", "TR-2"])
            .await
            .unwrap();
        let CompressOutcome::Grouped(gid) = outcome else {
            panic!("expected group");
        };

        let expanded = m.expand_tool_result(&gid.to_string()).await.unwrap();
        assert_eq!(expanded, vec![ToolId(1), ToolId(2)]);
        assert!(!m.dashboard().unwrap().contains("[G-"));
    }

    #[tokio::test]
    async fn test_malformed_id_rejected() {
        let mut m = manager(100_000, 5);
        record(&mut m, "a", 10).await;

        assert!(matches!(
            m.get_tool_result("TR-x"),
            Err(MemoryError::MalformedId(_))
        ));
        assert!(matches!(
            m.expand_tool_result("banana").await,
            Err(MemoryError::MalformedId(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_id_not_found() {
        let m = manager(100_000, 5);
        assert!(matches!(
            m.get_tool_result("TR-99"),
            Err(MemoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_worker_summaries_attached_on_compress() {
        let mut m = manager(100_000, 5);
        m.start_worker();
        record(&mut m, "execute_command", 2000).await;

        m.compress_tool_results(&["TR-1"]).await.unwrap();
        let summary = m.get_tool_result("TR-1").unwrap().summary.unwrap();
        assert!(!summary.degraded);
        assert!(summary.text.contains("execute_command"));
    }

    #[tokio::test]
    async fn test_failing_summarizer_degrades_to_fallback() {
        let mut m = MemoryManager::new(
            Box::new(MemStore::new()),
            MemoryConfig::new(),
            Arc::new(CharCounter),
            Arc::new(StaticSummarizer::failing()),
        );
        record(&mut m, "execute_command", 3000).await;

        m.compress_tool_results(&["TR-1"]).await.unwrap();
        let summary = m.get_tool_result("TR-1").unwrap().summary.unwrap();
        assert!(summary.degraded);
    }

    #[test]
    fn test_brief_params_prefers_known_keys() {
        assert_eq!(
            brief_params(&serde_json::json!({"command": "terraform plan", "cwd": "/infra"})),
            "terraform plan"
        );
        assert_eq!(
            brief_params(&serde_json::json!({"file_path": "src/main.tf"})),
            "src/main.tf"
        );
        assert_eq!(
            brief_params(&serde_json::json!({"query": "aws_s3_bucket"})),
            "aws_s3_bucket"
        );
        assert!(brief_params(&serde_json::json!({"code": "fn main() {}"}))
            .starts_with("code modification ("));
    }

    #[test]
    fn test_brief_params_truncates_unknown_shapes() {
        let brief = brief_params(&serde_json::json!({"payload": "z".repeat(200)}));
        assert!(brief.ends_with("..."));
        assert!(brief.len() <= 53);

        assert_eq!(brief_params(&serde_json::json!({"a": 1})), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_relate_and_suggest() {
        let mut m = manager(100_000, 5);
        record(&mut m, "read_file", 2000).await;
        record(&mut m, "execute_command", 2000).await;
        m.relate("TR-1", "TR-2", RelationKind::ProducedFor).unwrap();

        m.compress_tool_results(&["TR-1"]).await.unwrap();
        let hits = m.suggest_expansions("read_file output", 3).unwrap();
        assert_eq!(hits.first().map(|(id, _)| *id), Some(ToolId(1)));
    }
}
