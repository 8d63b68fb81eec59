//! Active-set assembly: what the dashboard shows this turn

use mnemo_core::{Group, GroupId, Result, ToolResult};
use mnemo_store::ResultStore;
use std::collections::HashSet;

/// One dashboard entry: a standalone tool result (verbatim or compressed
/// on its own) or a compressed group.
#[derive(Debug, Clone)]
pub enum ActiveEntry {
    Result(ToolResult),
    Group(Group),
}

impl ActiveEntry {
    /// Insertion position used for ordering; a group sorts at its first
    /// member's position.
    pub fn position(&self) -> u64 {
        match self {
            ActiveEntry::Result(r) => r.created_at,
            ActiveEntry::Group(g) => g.first_member().0,
        }
    }

    /// The id string the agent sees and passes back through the tool
    /// surface.
    pub fn visible_id(&self) -> String {
        match self {
            ActiveEntry::Result(r) => r.id.to_string(),
            ActiveEntry::Group(g) => g.id.to_string(),
        }
    }
}

/// Assemble the active set in ascending insertion order. Grouped members
/// are absorbed into their group, which appears once, at the position of
/// its first member.
pub fn active_set(store: &dyn ResultStore) -> Result<Vec<ActiveEntry>> {
    let mut entries = Vec::new();
    let mut emitted: HashSet<GroupId> = HashSet::new();

    for record in store.list()? {
        match record.group_id {
            Some(gid) if record.is_compressed() => {
                if emitted.insert(gid) {
                    entries.push(ActiveEntry::Group(store.get_group(gid)?));
                }
            }
            _ => entries.push(ActiveEntry::Result(record)),
        }
    }
    Ok(entries)
}
