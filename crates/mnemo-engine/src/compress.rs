//! Compression engine: explicit compression and budget-driven policy

use crate::dashboard::{compressed_block_body, group_block_body, total_active_tokens};
use mnemo_core::{
    Group, GroupId, MemoryConfig, MemoryError, Result, ResultState, TokenCounter, ToolId,
    ToolResult,
};
use mnemo_store::ResultStore;
use std::collections::HashSet;
use std::sync::Arc;

/// What a `compress` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressOutcome {
    /// Every supplied id was already compressed; nothing changed. Carries
    /// the group of the first member, if any.
    AlreadyCompressed(Option<GroupId>),
    /// One result compressed on its own summary.
    Single(ToolId),
    /// Two or more results bundled into a new group.
    Grouped(GroupId),
}

/// Outcome of one auto-compression run.
#[derive(Debug, Clone, Default)]
pub struct CompressionReport {
    /// Results compressed during this run, in compression order.
    pub compressed: Vec<ToolId>,
    /// Groups created during this run.
    pub groups_created: Vec<GroupId>,
    /// Rendered tokens before and after the run.
    pub initial_tokens: usize,
    pub final_tokens: usize,
    /// Set when no compressible candidates remain and the active set is
    /// still over budget. Informational, not an error.
    pub over_budget: bool,
}

/// Decides which active results to compress and performs the transition.
pub struct CompressionEngine {
    counter: Arc<dyn TokenCounter>,
    config: MemoryConfig,
}

impl CompressionEngine {
    pub fn new(counter: Arc<dyn TokenCounter>, config: MemoryConfig) -> Self {
        Self { counter, config }
    }

    /// Compress the given results, bundling them into one group when two
    /// or more are supplied.
    ///
    /// Unknown ids fail with `NotFound` before any mutation. Duplicate
    /// ids collapse to their first occurrence. Ids already compressed are
    /// skipped (idempotent). Every member must carry a summary; callers
    /// obtain one first (the manager awaits the background worker or
    /// summarizes synchronously). Fails with `NoGain`, leaving members
    /// untouched, if the compressed rendering would not be strictly
    /// smaller than the verbatim one.
    pub fn compress(&self, store: &mut dyn ResultStore, ids: &[ToolId]) -> Result<CompressOutcome> {
        let mut seen: HashSet<ToolId> = HashSet::with_capacity(ids.len());
        let mut records = Vec::with_capacity(ids.len());
        for &id in ids {
            if seen.insert(id) {
                records.push(store.get(id)?);
            }
        }

        let mut members: Vec<ToolResult> = records
            .iter()
            .filter(|r| !r.is_compressed())
            .cloned()
            .collect();
        if members.is_empty() {
            let existing = records.first().and_then(|r| r.group_id);
            return Ok(CompressOutcome::AlreadyCompressed(existing));
        }
        members.sort_by_key(|r| r.created_at);

        for member in &members {
            if member.summary.is_none() {
                return Err(MemoryError::Summarization(format!(
                    "no summary available for {}",
                    member.id
                )));
            }
        }

        if members.len() == 1 {
            let record = &members[0];
            let combined = self.counter.count(&compressed_block_body(record));
            if combined >= record.full_token_count {
                return Err(MemoryError::NoGain {
                    combined,
                    full: record.full_token_count,
                });
            }
            store.update_state(record.id, ResultState::Compressed, None)?;
            tracing::debug!(id = %record.id, combined, full = record.full_token_count, "compressed");
            return Ok(CompressOutcome::Single(record.id));
        }

        let combined_summary = join_member_summaries(&members);
        let group_id = GroupId(store.next_group_seq()?);
        let mut group = Group {
            id: group_id,
            member_ids: members.iter().map(|r| r.id).collect(),
            combined_summary,
            combined_token_count: 0,
        };
        group.combined_token_count = self.counter.count(&group_block_body(&group));

        let full_total: usize = members.iter().map(|r| r.full_token_count).sum();
        if group.combined_token_count >= full_total {
            return Err(MemoryError::NoGain {
                combined: group.combined_token_count,
                full: full_total,
            });
        }

        // group first so no member ever references a missing group
        store.insert_group(group.clone())?;
        for member in &members {
            store.update_state(member.id, ResultState::Compressed, Some(group_id))?;
        }
        tracing::debug!(
            group = %group_id,
            members = members.len(),
            combined = group.combined_token_count,
            full = full_total,
            "compressed group"
        );
        Ok(CompressOutcome::Grouped(group_id))
    }

    /// Compress until the rendered active set fits the budget.
    ///
    /// Policy: protect the newest `recency_window` results; seed with the
    /// oldest remaining candidate; pull in candidates sharing its tool
    /// name or connected by a grouping edge; repeat. A seed whose bundle
    /// yields no gain is skipped for the rest of the run.
    pub fn auto_compress(
        &self,
        store: &mut dyn ResultStore,
        budget: usize,
    ) -> Result<CompressionReport> {
        let mut report = CompressionReport {
            initial_tokens: total_active_tokens(store, self.counter.as_ref())?,
            ..Default::default()
        };
        let mut skipped: HashSet<ToolId> = HashSet::new();

        loop {
            let total = total_active_tokens(store, self.counter.as_ref())?;
            report.final_tokens = total;
            if total <= budget {
                return Ok(report);
            }

            let records = store.list()?;
            let protected: HashSet<ToolId> = records
                .iter()
                .rev()
                .take(self.config.recency_window)
                .map(|r| r.id)
                .collect();
            let candidates: Vec<&ToolResult> = records
                .iter()
                .filter(|r| {
                    !r.is_compressed()
                        && !protected.contains(&r.id)
                        && !skipped.contains(&r.id)
                        && r.summary.is_some()
                })
                .collect();

            let Some(seed) = candidates.first() else {
                report.over_budget = true;
                tracing::warn!(total, budget, "no compressible candidates, still over budget");
                return Ok(report);
            };

            let connected: HashSet<ToolId> = store
                .relationships_of(seed.id)?
                .into_iter()
                .filter(|(_, kind)| kind.groups_together())
                .map(|(other, _)| other)
                .collect();
            let bundle: Vec<ToolId> = candidates
                .iter()
                .filter(|r| {
                    r.id == seed.id
                        || r.tool_name == seed.tool_name
                        || connected.contains(&r.id)
                })
                .map(|r| r.id)
                .collect();

            match self.compress(store, &bundle) {
                Ok(CompressOutcome::Grouped(gid)) => {
                    report.groups_created.push(gid);
                    report.compressed.extend(&bundle);
                }
                Ok(CompressOutcome::Single(id)) => report.compressed.push(id),
                Ok(CompressOutcome::AlreadyCompressed(_)) => {
                    skipped.extend(&bundle);
                }
                Err(MemoryError::NoGain { .. }) => {
                    skipped.extend(&bundle);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `[TR-3] summary | [TR-4] summary`
pub(crate) fn join_member_summaries(members: &[ToolResult]) -> String {
    members
        .iter()
        .map(|r| {
            let text = r
                .summary
                .as_ref()
                .map(|s| s.text.as_str())
                .unwrap_or("Summary not available");
            format!("[{}] {}", r.id, text)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
