//! Tool result, group, and relationship types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a recorded tool result, shown to the agent as `TR-<n>`.
///
/// Sequence numbers are assigned at creation, monotonically increasing,
/// and never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ToolId(pub u64);

impl ToolId {
    /// Parse the dashboard-visible form (`TR-3`).
    pub fn parse(s: &str) -> Option<Self> {
        s.strip_prefix("TR-")?.parse().ok().map(ToolId)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TR-{}", self.0)
    }
}

/// Identifier of a compressed group, shown to the agent as `G-<n>`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl GroupId {
    pub fn parse(s: &str) -> Option<Self> {
        s.strip_prefix("G-")?.parse().ok().map(GroupId)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// Outcome of the underlying tool execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolStatus {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "failure")]
    Failure,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(ToolStatus::Success),
            "failure" => Some(ToolStatus::Failure),
            _ => None,
        }
    }

    /// Uppercase form used in dashboard headers.
    pub fn label(&self) -> &'static str {
        match self {
            ToolStatus::Success => "SUCCESS",
            ToolStatus::Failure => "FAILURE",
        }
    }
}

/// Display state of a tool result.
///
/// Summary readiness is not a state: a summary may be attached at any
/// point without changing the state. `Expanded` behaves like `Full` but
/// records that the result was compressed and then restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultState {
    #[serde(rename = "FULL")]
    Full,
    #[serde(rename = "COMPRESSED")]
    Compressed,
    #[serde(rename = "EXPANDED")]
    Expanded,
}

impl ResultState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultState::Full => "FULL",
            ResultState::Compressed => "COMPRESSED",
            ResultState::Expanded => "EXPANDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FULL" => Some(ResultState::Full),
            "COMPRESSED" => Some(ResultState::Compressed),
            "EXPANDED" => Some(ResultState::Expanded),
            _ => None,
        }
    }

    /// Whether `from -> to` is a legal state transition.
    ///
    /// Full/Expanded may be compressed; Compressed may be expanded; a
    /// result can cycle Compressed/Expanded arbitrarily. Same-state
    /// transitions are rejected here and handled as no-ops by callers.
    pub fn valid_transition(from: ResultState, to: ResultState) -> bool {
        matches!(
            (from, to),
            (ResultState::Full, ResultState::Compressed)
                | (ResultState::Expanded, ResultState::Compressed)
                | (ResultState::Compressed, ResultState::Expanded)
        )
    }
}

/// Summary attached to a tool result by the summarization collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub text: String,
    /// Structured key facts extracted during summarization.
    #[serde(default)]
    pub salient_facts: BTreeMap<String, String>,
    pub token_count: usize,
    /// Set when the summary came from the truncated-verbatim fallback.
    #[serde(default)]
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

/// One agent action's recorded outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub id: ToolId,
    pub tool_name: String,
    /// Structured parameters the tool was invoked with.
    pub input: serde_json::Value,
    /// Raw output payload, retained verbatim forever.
    pub output: String,
    pub status: ToolStatus,
    /// Logical sequence position; equals the id number and is immutable.
    pub created_at: u64,
    pub timestamp: DateTime<Utc>,
    /// Token cost of the verbatim rendered block body, cached at creation.
    pub full_token_count: usize,
    #[serde(default)]
    pub summary: Option<ToolSummary>,
    pub state: ResultState,
    /// Set only while compressed as part of a group.
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

impl ToolResult {
    pub fn is_compressed(&self) -> bool {
        self.state == ResultState::Compressed
    }

    /// Whether the result renders verbatim (Full or Expanded).
    pub fn is_verbatim(&self) -> bool {
        matches!(self.state, ResultState::Full | ResultState::Expanded)
    }
}

/// A compressed bundle of related tool results sharing one combined summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// Non-empty, in original insertion order among members.
    pub member_ids: Vec<ToolId>,
    pub combined_summary: String,
    pub combined_token_count: usize,
}

impl Group {
    /// Insertion position of the group in the active set.
    pub fn first_member(&self) -> ToolId {
        self.member_ids[0]
    }
}

/// Directed typed edge between two tool results. Metadata only; edges
/// never imply ownership or deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// The source result was fetched because the target step needed it.
    #[serde(rename = "PRODUCED_FOR")]
    ProducedFor,
    /// Same target or domain (same integration, same file, ...).
    #[serde(rename = "RELATED_TO")]
    RelatedTo,
    /// A later identical-intent call replacing an earlier one.
    #[serde(rename = "SUPERSEDES")]
    Supersedes,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::ProducedFor => "PRODUCED_FOR",
            RelationKind::RelatedTo => "RELATED_TO",
            RelationKind::Supersedes => "SUPERSEDES",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRODUCED_FOR" => Some(RelationKind::ProducedFor),
            "RELATED_TO" => Some(RelationKind::RelatedTo),
            "SUPERSEDES" => Some(RelationKind::Supersedes),
            _ => None,
        }
    }

    /// Kinds the auto-compression policy treats as grouping signals.
    pub fn groups_together(&self) -> bool {
        matches!(self, RelationKind::RelatedTo | RelationKind::ProducedFor)
    }
}
