//! Degraded-mode wrapper: in-memory shadow with write replay

use crate::memory::MemStore;
use crate::store::ResultStore;
use mnemo_core::{
    Group, GroupId, RelationKind, ResultState, Result, ToolId, ToolResult, ToolSummary,
};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum PendingWrite {
    Append(ToolResult),
    AttachSummary(ToolId, ToolSummary),
    AddRelationship(ToolId, ToolId, RelationKind),
    UpdateState(ToolId, ResultState, Option<GroupId>),
    InsertGroup(Group),
    UpdateGroup(Group),
    RemoveGroup(GroupId),
}

/// Wraps a fallible store with a complete in-memory shadow.
///
/// Every write is validated and applied against the shadow first, then
/// mirrored to the inner store. When the inner store becomes unreachable
/// the wrapper flips to degraded mode: the agent keeps operating against
/// the shadow and writes queue until `replay` succeeds.
pub struct ShadowStore<S: ResultStore> {
    inner: S,
    shadow: MemStore,
    pending: VecDeque<PendingWrite>,
    degraded: bool,
}

impl<S: ResultStore> ShadowStore<S> {
    /// Wrap an inner store, seeding the shadow from its current contents.
    pub fn new(inner: S) -> Result<Self> {
        let mut shadow = MemStore::new();
        let mut max_tool = 0;
        for record in inner.list()? {
            max_tool = max_tool.max(record.id.0);
            shadow.append(record)?;
        }
        let mut max_group = 0;
        for group in inner.groups()? {
            max_group = max_group.max(group.id.0);
            shadow.insert_group(group)?;
        }
        shadow.set_seqs(max_tool, max_group);
        for (src, dst, kind) in inner.relationships()? {
            shadow.add_relationship(src, dst, kind)?;
        }
        Ok(Self {
            inner,
            shadow,
            pending: VecDeque::new(),
            degraded: false,
        })
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Flush queued writes into the inner store. On success the wrapper
    /// leaves degraded mode; on failure it stays degraded with the
    /// unflushed writes intact and returns the inner error.
    pub fn replay(&mut self) -> Result<usize> {
        let mut replayed = 0;
        while let Some(write) = self.pending.front().cloned() {
            apply(&mut self.inner, &write)?;
            self.pending.pop_front();
            replayed += 1;
        }
        if self.degraded {
            tracing::info!(replayed, "store recovered, shadow writes replayed");
        }
        self.degraded = false;
        Ok(replayed)
    }

    fn mirror(&mut self, write: PendingWrite) -> Result<()> {
        if self.degraded {
            self.pending.push_back(write);
            return Ok(());
        }
        if let Err(e) = apply(&mut self.inner, &write) {
            tracing::warn!(error = %e, "store write failed, entering degraded mode");
            self.degraded = true;
            self.pending.push_back(write);
        }
        Ok(())
    }
}

fn apply<S: ResultStore>(store: &mut S, write: &PendingWrite) -> Result<()> {
    match write {
        PendingWrite::Append(r) => store.append(r.clone()),
        PendingWrite::AttachSummary(id, s) => store.attach_summary(*id, s.clone()),
        PendingWrite::AddRelationship(src, dst, kind) => {
            store.add_relationship(*src, *dst, *kind)
        }
        PendingWrite::UpdateState(id, state, group) => store.update_state(*id, *state, *group),
        PendingWrite::InsertGroup(g) => store.insert_group(g.clone()),
        PendingWrite::UpdateGroup(g) => store.update_group(g.clone()),
        PendingWrite::RemoveGroup(id) => store.remove_group(*id),
    }
}

impl<S: ResultStore> ResultStore for ShadowStore<S> {
    fn append(&mut self, record: ToolResult) -> Result<()> {
        self.shadow.append(record.clone())?;
        self.mirror(PendingWrite::Append(record))
    }

    fn get(&self, id: ToolId) -> Result<ToolResult> {
        self.shadow.get(id)
    }

    fn list(&self) -> Result<Vec<ToolResult>> {
        self.shadow.list()
    }

    fn attach_summary(&mut self, id: ToolId, summary: ToolSummary) -> Result<()> {
        self.shadow.attach_summary(id, summary.clone())?;
        self.mirror(PendingWrite::AttachSummary(id, summary))
    }

    fn add_relationship(&mut self, src: ToolId, dst: ToolId, kind: RelationKind) -> Result<()> {
        self.shadow.add_relationship(src, dst, kind)?;
        self.mirror(PendingWrite::AddRelationship(src, dst, kind))
    }

    fn relationships_of(&self, id: ToolId) -> Result<Vec<(ToolId, RelationKind)>> {
        self.shadow.relationships_of(id)
    }

    fn relationships(&self) -> Result<Vec<(ToolId, ToolId, RelationKind)>> {
        self.shadow.relationships()
    }

    fn update_state(
        &mut self,
        id: ToolId,
        new_state: ResultState,
        group_id: Option<GroupId>,
    ) -> Result<()> {
        self.shadow.update_state(id, new_state, group_id)?;
        self.mirror(PendingWrite::UpdateState(id, new_state, group_id))
    }

    fn insert_group(&mut self, group: Group) -> Result<()> {
        self.shadow.insert_group(group.clone())?;
        self.mirror(PendingWrite::InsertGroup(group))
    }

    fn get_group(&self, id: GroupId) -> Result<Group> {
        self.shadow.get_group(id)
    }

    fn update_group(&mut self, group: Group) -> Result<()> {
        self.shadow.update_group(group.clone())?;
        self.mirror(PendingWrite::UpdateGroup(group))
    }

    fn remove_group(&mut self, id: GroupId) -> Result<()> {
        self.shadow.remove_group(id)?;
        self.mirror(PendingWrite::RemoveGroup(id))
    }

    fn groups(&self) -> Result<Vec<Group>> {
        self.shadow.groups()
    }

    fn next_tool_seq(&mut self) -> Result<u64> {
        if self.degraded {
            return self.shadow.next_tool_seq();
        }
        match self.inner.next_tool_seq() {
            Ok(seq) => {
                self.shadow.set_seqs(seq, 0);
                Ok(seq)
            }
            Err(e) => {
                tracing::warn!(error = %e, "store unreachable, entering degraded mode");
                self.degraded = true;
                self.shadow.next_tool_seq()
            }
        }
    }

    fn next_group_seq(&mut self) -> Result<u64> {
        if self.degraded {
            return self.shadow.next_group_seq();
        }
        match self.inner.next_group_seq() {
            Ok(seq) => {
                self.shadow.set_seqs(0, seq);
                Ok(seq)
            }
            Err(e) => {
                tracing::warn!(error = %e, "store unreachable, entering degraded mode");
                self.degraded = true;
                self.shadow.next_group_seq()
            }
        }
    }
}
