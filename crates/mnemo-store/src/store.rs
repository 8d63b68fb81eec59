//! ResultStore trait: the persistence seam for the memory graph

use mnemo_core::{
    Group, GroupId, MemoryError, RelationKind, ResultState, Result, ToolId, ToolResult,
    ToolSummary,
};

/// Durable graph of tool-result nodes, groups, and typed relationships.
///
/// The core depends only on this capability, not on any specific query
/// language or storage engine. Mutations are atomic with respect to a
/// single record or group: a record never references a missing group.
pub trait ResultStore: Send {
    /// Add a new node. Fails with `DuplicateId` if the id exists.
    fn append(&mut self, record: ToolResult) -> Result<()>;

    /// Full record by id, or `NotFound`.
    fn get(&self, id: ToolId) -> Result<ToolResult>;

    /// All records in insertion order.
    fn list(&self) -> Result<Vec<ToolResult>>;

    /// Attach (or replace) the summary for a record. State is unchanged.
    fn attach_summary(&mut self, id: ToolId, summary: ToolSummary) -> Result<()>;

    /// Add a directed typed edge. Idempotent: re-adding is a no-op.
    fn add_relationship(&mut self, src: ToolId, dst: ToolId, kind: RelationKind) -> Result<()>;

    /// Outgoing and incoming edges of a record as `(other, kind)` pairs.
    fn relationships_of(&self, id: ToolId) -> Result<Vec<(ToolId, RelationKind)>>;

    /// Every edge as a `(src, dst, kind)` triple (shadow seeding, export).
    fn relationships(&self) -> Result<Vec<(ToolId, ToolId, RelationKind)>>;

    /// Transition a record's state, validating against the state machine.
    /// `group_id` must be `Some` only when entering a group.
    fn update_state(
        &mut self,
        id: ToolId,
        new_state: ResultState,
        group_id: Option<GroupId>,
    ) -> Result<()>;

    fn insert_group(&mut self, group: Group) -> Result<()>;

    fn get_group(&self, id: GroupId) -> Result<Group>;

    /// Replace a group's members and combined summary (member departure).
    fn update_group(&mut self, group: Group) -> Result<()>;

    fn remove_group(&mut self, id: GroupId) -> Result<()>;

    /// All groups in creation order.
    fn groups(&self) -> Result<Vec<Group>>;

    /// Allocate the next tool sequence number. Never reused.
    fn next_tool_seq(&mut self) -> Result<u64>;

    /// Allocate the next group sequence number. Never reused.
    fn next_group_seq(&mut self) -> Result<u64>;
}

/// Shared transition check used by every backing.
pub(crate) fn check_transition(record: &ToolResult, to: ResultState) -> Result<()> {
    if ResultState::valid_transition(record.state, to) {
        Ok(())
    } else {
        Err(MemoryError::InvalidTransition {
            id: record.id.to_string(),
            from: record.state,
            to,
        })
    }
}
