//! Expansion: bring compressed results back verbatim

use crate::compress::join_member_summaries;
use crate::dashboard::group_block_body;
use mnemo_core::{GroupId, Result, ResultState, TokenCounter, ToolId, ToolResult};
use mnemo_store::ResultStore;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// Restores compressed results to their verbatim form and suggests which
/// compressed results a query likely needs.
pub struct ExpansionSelector {
    counter: Arc<dyn TokenCounter>,
}

impl ExpansionSelector {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self { counter }
    }

    /// Expand one result back to its full output.
    ///
    /// A verbatim result is returned unchanged. A grouped member leaves
    /// its group first; the group's combined summary is re-joined over
    /// the remaining members, and the group dissolves when the last
    /// member leaves.
    pub fn expand(&self, store: &mut dyn ResultStore, id: ToolId) -> Result<ToolResult> {
        let record = store.get(id)?;
        if record.is_verbatim() {
            return Ok(record);
        }

        if let Some(gid) = record.group_id {
            self.leave_group(store, gid, id)?;
        }
        store.update_state(id, ResultState::Expanded, None)?;
        tracing::debug!(%id, "expanded");
        store.get(id)
    }

    /// Expand every member of a group and dissolve it.
    pub fn expand_group(&self, store: &mut dyn ResultStore, gid: GroupId) -> Result<Vec<ToolId>> {
        let group = store.get_group(gid)?;
        for &member in &group.member_ids {
            store.update_state(member, ResultState::Expanded, None)?;
        }
        store.remove_group(gid)?;
        tracing::debug!(group = %gid, members = group.member_ids.len(), "expanded group");
        Ok(group.member_ids)
    }

    fn leave_group(&self, store: &mut dyn ResultStore, gid: GroupId, id: ToolId) -> Result<()> {
        let mut group = store.get_group(gid)?;
        group.member_ids.retain(|m| *m != id);
        if group.member_ids.is_empty() {
            return store.remove_group(gid);
        }

        let mut remaining = Vec::with_capacity(group.member_ids.len());
        for &member in &group.member_ids {
            remaining.push(store.get(member)?);
        }
        group.combined_summary = join_member_summaries(&remaining);
        group.combined_token_count = self.counter.count(&group_block_body(&group));
        store.update_group(group)
    }

    /// Rank compressed results by lexical overlap between the query and
    /// their tool name, summary text, and salient facts. Scores are the
    /// fraction of query terms matched; zero-overlap results are omitted.
    pub fn suggest_candidates(
        &self,
        store: &dyn ResultStore,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(ToolId, f64)>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored = Vec::new();
        for record in store.list()? {
            if !record.is_compressed() {
                continue;
            }
            let mut haystack = record.tool_name.clone();
            if let Some(summary) = &record.summary {
                haystack.push(' ');
                haystack.push_str(&summary.text);
                for (key, value) in &summary.salient_facts {
                    haystack.push(' ');
                    haystack.push_str(key);
                    haystack.push(' ');
                    haystack.push_str(value);
                }
            }
            let overlap = query_terms.intersection(&terms(&haystack)).count();
            if overlap > 0 {
                scored.push((record.id, overlap as f64 / query_terms.len() as f64));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0 .0.cmp(&b.0 .0))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_ascii_lowercase())
        .collect()
}
