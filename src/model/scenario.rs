//! Scenario definition model.

use serde::{Deserialize, Serialize};

use crate::{
    FlowError, Result,
    model::{edge::Edge, node::NodeModel},
};

/// A named conversation-flow graph as fetched from the scenario builder.
/// Immutable once loaded for a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "startNodeId", skip_serializing_if = "Option::is_none")]
    pub start_node_id: Option<String>,
    pub nodes: Vec<NodeModel>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl ScenarioDefinition {
    /// Parse a definition from JSON, validating the overall shape against a
    /// schema before field-level parsing.
    pub fn from_json(s: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(s).map_err(|e| FlowError::Definition(format!("invalid scenario json: {}", e)))?;
        let schema = Self::schema();
        jsonschema::validate(&schema, &value)?;
        serde_json::from_value(value).map_err(|e| FlowError::Definition(format!("invalid scenario definition: {}", e)))
    }

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["id", "nodes"],
            "properties": {
                "id": { "type": "string" },
                "name": { "type": "string" },
                "start_node_id": { "type": ["string", "null"] },
                "nodes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "type"],
                        "properties": {
                            "id": { "type": "string" },
                            "type": { "type": "string" },
                            "data": {}
                        }
                    }
                },
                "edges": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["source", "target"],
                        "properties": {
                            "id": { "type": "string" },
                            "source": { "type": "string" },
                            "target": { "type": "string" },
                            "sourceHandle": { "type": ["string", "null"] }
                        }
                    }
                }
            }
        })
    }
}
