//! Scenario edge definitions.
//!
//! Edges define the flow between nodes; when a node has several outgoing
//! edges, `source_handle` names which output port an edge leaves from and is
//! matched against the handle chosen at transition time.

use serde::{Deserialize, Serialize};

use crate::model::node::NodeId;

/// Unique identifier for an edge within a scenario.
pub type EdgeId = String;

/// Handle on an api node's edge taken when the call succeeds.
pub const HANDLE_ON_SUCCESS: &str = "onSuccess";
/// Handle on an api or llm node's edge taken when the call fails.
pub const HANDLE_ON_ERROR: &str = "onError";
/// Handle on a branch node's edge taken when no condition matches.
pub const HANDLE_DEFAULT: &str = "default";

/// A directed link between two nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: EdgeId,
    /// ID of the source node.
    pub source: NodeId,
    /// ID of the target node.
    pub target: NodeId,
    /// Which output port this edge leaves from, when the source node has
    /// more than one.
    #[serde(rename = "sourceHandle", alias = "source_handle", default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    /// Whether this edge leaves from the given handle.
    pub fn has_handle(
        &self,
        handle: &str,
    ) -> bool {
        self.source_handle.as_deref() == Some(handle)
    }
}
