//! In-memory store backed by a petgraph relationship graph

use crate::store::{check_transition, ResultStore};
use mnemo_core::{
    Group, GroupId, MemoryError, RelationKind, ResultState, Result, ToolId, ToolResult,
    ToolSummary,
};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

/// Adjacency-map backing used for tests and as the default runtime store.
#[derive(Debug, Default)]
pub struct MemStore {
    records: BTreeMap<u64, ToolResult>,
    groups: BTreeMap<u64, Group>,
    graph: DiGraph<ToolId, RelationKind>,
    node_indices: HashMap<ToolId, NodeIndex>,
    tool_seq: u64,
    group_seq: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_of(&mut self, id: ToolId) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(id);
        self.node_indices.insert(id, idx);
        idx
    }

    /// Fast-forward the sequence counters (shadow seeding).
    pub(crate) fn set_seqs(&mut self, tool_seq: u64, group_seq: u64) {
        self.tool_seq = self.tool_seq.max(tool_seq);
        self.group_seq = self.group_seq.max(group_seq);
    }

    fn record_mut(&mut self, id: ToolId) -> Result<&mut ToolResult> {
        self.records
            .get_mut(&id.0)
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }
}

impl ResultStore for MemStore {
    fn append(&mut self, record: ToolResult) -> Result<()> {
        if self.records.contains_key(&record.id.0) {
            return Err(MemoryError::DuplicateId(record.id.to_string()));
        }
        self.node_of(record.id);
        self.records.insert(record.id.0, record);
        Ok(())
    }

    fn get(&self, id: ToolId) -> Result<ToolResult> {
        self.records
            .get(&id.0)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    fn list(&self) -> Result<Vec<ToolResult>> {
        Ok(self.records.values().cloned().collect())
    }

    fn attach_summary(&mut self, id: ToolId, summary: ToolSummary) -> Result<()> {
        self.record_mut(id)?.summary = Some(summary);
        Ok(())
    }

    fn add_relationship(&mut self, src: ToolId, dst: ToolId, kind: RelationKind) -> Result<()> {
        if !self.records.contains_key(&src.0) {
            return Err(MemoryError::NotFound(src.to_string()));
        }
        if !self.records.contains_key(&dst.0) {
            return Err(MemoryError::NotFound(dst.to_string()));
        }
        let a = self.node_of(src);
        let b = self.node_of(dst);
        let exists = self
            .graph
            .edges_connecting(a, b)
            .any(|e| *e.weight() == kind);
        if !exists {
            self.graph.add_edge(a, b, kind);
        }
        Ok(())
    }

    fn relationships_of(&self, id: ToolId) -> Result<Vec<(ToolId, RelationKind)>> {
        if !self.records.contains_key(&id.0) {
            return Err(MemoryError::NotFound(id.to_string()));
        }
        let mut out = Vec::new();
        if let Some(&idx) = self.node_indices.get(&id) {
            for dir in [Direction::Outgoing, Direction::Incoming] {
                for edge in self.graph.edges_directed(idx, dir) {
                    let other = match dir {
                        Direction::Outgoing => edge.target(),
                        Direction::Incoming => edge.source(),
                    };
                    out.push((self.graph[other], *edge.weight()));
                }
            }
        }
        Ok(out)
    }

    fn relationships(&self) -> Result<Vec<(ToolId, ToolId, RelationKind)>> {
        let mut out = Vec::new();
        for edge in self.graph.edge_indices() {
            if let Some((a, b)) = self.graph.edge_endpoints(edge) {
                out.push((self.graph[a], self.graph[b], self.graph[edge]));
            }
        }
        Ok(out)
    }

    fn update_state(
        &mut self,
        id: ToolId,
        new_state: ResultState,
        group_id: Option<GroupId>,
    ) -> Result<()> {
        if let Some(gid) = group_id {
            if !self.groups.contains_key(&gid.0) {
                return Err(MemoryError::NotFound(gid.to_string()));
            }
        }
        let record = self.record_mut(id)?;
        check_transition(record, new_state)?;
        record.state = new_state;
        record.group_id = group_id;
        Ok(())
    }

    fn insert_group(&mut self, group: Group) -> Result<()> {
        if self.groups.contains_key(&group.id.0) {
            return Err(MemoryError::DuplicateId(group.id.to_string()));
        }
        self.groups.insert(group.id.0, group);
        Ok(())
    }

    fn get_group(&self, id: GroupId) -> Result<Group> {
        self.groups
            .get(&id.0)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    fn update_group(&mut self, group: Group) -> Result<()> {
        if !self.groups.contains_key(&group.id.0) {
            return Err(MemoryError::NotFound(group.id.to_string()));
        }
        self.groups.insert(group.id.0, group);
        Ok(())
    }

    fn remove_group(&mut self, id: GroupId) -> Result<()> {
        self.groups
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| MemoryError::NotFound(id.to_string()))
    }

    fn groups(&self) -> Result<Vec<Group>> {
        Ok(self.groups.values().cloned().collect())
    }

    fn next_tool_seq(&mut self) -> Result<u64> {
        self.tool_seq += 1;
        Ok(self.tool_seq)
    }

    fn next_group_seq(&mut self) -> Result<u64> {
        self.group_seq += 1;
        Ok(self.group_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(n: u64, tool: &str) -> ToolResult {
        ToolResult {
            id: ToolId(n),
            tool_name: tool.to_string(),
            input: serde_json::json!({"command": "ls"}),
            output: format!("output {}", n),
            status: mnemo_core::ToolStatus::Success,
            created_at: n,
            timestamp: Utc::now(),
            full_token_count: 10,
            summary: None,
            state: ResultState::Full,
            group_id: None,
        }
    }

    #[test]
    fn test_append_and_get() {
        let mut store = MemStore::new();
        store.append(record(1, "execute_command")).unwrap();

        let got = store.get(ToolId(1)).unwrap();
        assert_eq!(got.tool_name, "execute_command");

        assert!(matches!(
            store.get(ToolId(9)),
            Err(MemoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut store = MemStore::new();
        store.append(record(1, "a")).unwrap();
        assert!(matches!(
            store.append(record(1, "b")),
            Err(MemoryError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_list_insertion_order() {
        let mut store = MemStore::new();
        for n in [1, 2, 3] {
            store.append(record(n, "t")).unwrap();
        }
        let ids: Vec<u64> = store.list().unwrap().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_relationship_idempotent() {
        let mut store = MemStore::new();
        store.append(record(1, "a")).unwrap();
        store.append(record(2, "a")).unwrap();

        store
            .add_relationship(ToolId(2), ToolId(1), RelationKind::RelatedTo)
            .unwrap();
        store
            .add_relationship(ToolId(2), ToolId(1), RelationKind::RelatedTo)
            .unwrap();

        assert_eq!(store.relationships_of(ToolId(2)).unwrap().len(), 1);
        // visible from both ends
        assert_eq!(store.relationships_of(ToolId(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_relationship_unknown_endpoint() {
        let mut store = MemStore::new();
        store.append(record(1, "a")).unwrap();
        assert!(matches!(
            store.add_relationship(ToolId(1), ToolId(9), RelationKind::Supersedes),
            Err(MemoryError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_state_validates() {
        let mut store = MemStore::new();
        store.append(record(1, "a")).unwrap();

        // FULL -> EXPANDED is illegal
        assert!(matches!(
            store.update_state(ToolId(1), ResultState::Expanded, None),
            Err(MemoryError::InvalidTransition { .. })
        ));

        store
            .update_state(ToolId(1), ResultState::Compressed, None)
            .unwrap();
        store
            .update_state(ToolId(1), ResultState::Expanded, None)
            .unwrap();
        assert_eq!(store.get(ToolId(1)).unwrap().state, ResultState::Expanded);
    }

    #[test]
    fn test_update_state_rejects_missing_group() {
        let mut store = MemStore::new();
        store.append(record(1, "a")).unwrap();
        assert!(matches!(
            store.update_state(ToolId(1), ResultState::Compressed, Some(GroupId(5))),
            Err(MemoryError::NotFound(_))
        ));
        // record untouched after the failed write
        assert_eq!(store.get(ToolId(1)).unwrap().state, ResultState::Full);
    }

    #[test]
    fn test_group_crud() {
        let mut store = MemStore::new();
        store.append(record(1, "a")).unwrap();
        store.append(record(2, "a")).unwrap();

        let group = Group {
            id: GroupId(1),
            member_ids: vec![ToolId(1), ToolId(2)],
            combined_summary: "[TR-1] x | [TR-2] y".to_string(),
            combined_token_count: 8,
        };
        store.insert_group(group.clone()).unwrap();
        assert_eq!(store.get_group(GroupId(1)).unwrap().member_ids.len(), 2);

        store.remove_group(GroupId(1)).unwrap();
        assert!(store.get_group(GroupId(1)).is_err());
    }

    #[test]
    fn test_seq_never_reused() {
        let mut store = MemStore::new();
        assert_eq!(store.next_tool_seq().unwrap(), 1);
        assert_eq!(store.next_tool_seq().unwrap(), 2);
        assert_eq!(store.next_group_seq().unwrap(), 1);
    }
}
