//! Indexed scenario graph.
//!
//! Wraps a parsed scenario in lookup structures for execution: node index,
//! outgoing-edge lists in authoring order, and the resolved start node.
//! Authoring order matters — it is the deterministic fallback tie-break used
//! when picking among a node's outgoing edges.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::{
    FlowError, Result,
    model::{Edge, EdgeId, Node, NodeId, ScenarioDefinition},
};

/// Immutable per-scenario index shared by every session of that scenario.
#[derive(Debug)]
pub struct GraphStore {
    id: String,
    name: String,
    start_node_id: NodeId,
    nodes: HashMap<NodeId, Node>,
    /// Outgoing edges per node, in authoring order. petgraph's own edge
    /// iteration reverses insertion order, so the contractual order lives
    /// here.
    outgoing: HashMap<NodeId, Vec<Edge>>,
    graph: DiGraph<NodeId, EdgeId>,
}

impl GraphStore {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a node by id.
    pub fn node_by_id(
        &self,
        id: &str,
    ) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All edges leaving `node_id`, in authoring order. Unknown ids yield an
    /// empty slice.
    pub fn outgoing_edges(
        &self,
        node_id: &str,
    ) -> &[Edge] {
        self.outgoing.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The node a fresh session begins at.
    pub fn start_node(&self) -> &Node {
        // construction guarantees the start id resolves
        &self.nodes[&self.start_node_id]
    }

    /// Human-readable dump of the graph structure, for diagnostics.
    pub fn schema(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("=== Scenario '{}' ===", self.id));
        lines.push(format!("Nodes: {}, Edges: {}", self.graph.node_count(), self.graph.edge_count()));

        for idx in self.graph.node_indices() {
            let nid = &self.graph[idx];
            let outgoing: Vec<String> = self
                .outgoing_edges(nid)
                .iter()
                .map(|e| match &e.source_handle {
                    Some(handle) => format!("{}({})", e.target, handle),
                    None => e.target.clone(),
                })
                .collect();

            if outgoing.is_empty() {
                lines.push(format!("{} -> (end)", nid));
            } else {
                lines.push(format!("{} -> {}", nid, outgoing.join(", ")));
            }
        }

        lines.join("\n")
    }
}

impl TryFrom<&ScenarioDefinition> for GraphStore {
    type Error = FlowError;

    fn try_from(definition: &ScenarioDefinition) -> Result<Self> {
        if definition.nodes.is_empty() {
            return Err(FlowError::Definition(format!("scenario '{}' has no nodes", definition.id)));
        }

        let mut graph: DiGraph<NodeId, EdgeId> = DiGraph::new();
        let mut nodes = HashMap::new();
        let mut indices: HashMap<NodeId, NodeIndex> = HashMap::new();
        let mut outgoing: HashMap<NodeId, Vec<Edge>> = HashMap::new();

        for model in definition.nodes.iter() {
            let node = Node::new(model)?;
            if nodes.contains_key(&node.id) {
                return Err(FlowError::Definition(format!("scenario '{}': duplicate node id '{}'", definition.id, node.id)));
            }
            let idx = graph.add_node(node.id.clone());
            indices.insert(node.id.clone(), idx);
            nodes.insert(node.id.clone(), node);
        }

        for edge in definition.edges.iter() {
            let source = indices.get(&edge.source).ok_or(FlowError::Definition(format!("scenario '{}': edge '{}' references missing source node '{}'", definition.id, edge.id, edge.source)))?;
            let target = indices.get(&edge.target).ok_or(FlowError::Definition(format!("scenario '{}': edge '{}' references missing target node '{}'", definition.id, edge.id, edge.target)))?;
            graph.add_edge(*source, *target, edge.id.clone());
            outgoing.entry(edge.source.clone()).or_default().push(edge.clone());
        }

        let start_node_id = definition
            .start_node_id
            .clone()
            .or_else(|| definition.nodes.first().map(|n| n.id.clone()))
            .filter(|id| nodes.contains_key(id))
            .ok_or(FlowError::Definition(format!("scenario '{}' has no resolvable start node", definition.id)))?;

        Ok(Self {
            id: definition.id.clone(),
            name: definition.name.clone(),
            start_node_id,
            nodes,
            outgoing,
            graph,
        })
    }
}
