//! Scenario node definitions.
//!
//! The wire form of a node is `{id, type, data}` with a type-specific `data`
//! payload. At load time each node is parsed into the `NodeKind` union so the
//! executor dispatches on an exhaustive `match` instead of string checks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    FlowError, Result,
    eval::{Operator, ValidationRule},
};

/// node id
pub type NodeId = String;

/// Wire form of a node as authored: a type string plus an untyped payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeModel {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: Value,
}

/// A single step of a conversation flow.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

/// Typed node payloads, one variant per node type.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Message(MessagePayload),
    Branch(BranchPayload),
    SlotFilling(SlotFillingPayload),
    Form(FormPayload),
    SetSlot(SetSlotPayload),
    Delay(DelayPayload),
    Api(ApiPayload),
    Llm(LlmPayload),
    End(EndPayload),
}

impl Node {
    /// Parse a wire node into its typed form.
    ///
    /// Unknown type strings and malformed payloads are definition errors.
    pub fn new(model: &NodeModel) -> Result<Self> {
        let data = if model.data.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            model.data.clone()
        };

        let parse_err = |e: serde_json::Error| FlowError::Definition(format!("node '{}': invalid {} payload: {}", model.id, model.node_type, e));

        let kind = match model.node_type.as_str() {
            "message" => NodeKind::Message(serde_json::from_value(data).map_err(parse_err)?),
            "branch" => NodeKind::Branch(serde_json::from_value(data).map_err(parse_err)?),
            "slotfilling" => NodeKind::SlotFilling(serde_json::from_value(data).map_err(parse_err)?),
            "form" => NodeKind::Form(serde_json::from_value(data).map_err(parse_err)?),
            "setSlot" | "set-slot" => NodeKind::SetSlot(serde_json::from_value(data).map_err(parse_err)?),
            "delay" => NodeKind::Delay(serde_json::from_value(data).map_err(parse_err)?),
            "api" => NodeKind::Api(serde_json::from_value(data).map_err(parse_err)?),
            "llm" => NodeKind::Llm(serde_json::from_value(data).map_err(parse_err)?),
            "end" => NodeKind::End(serde_json::from_value(data).map_err(parse_err)?),
            other => {
                return Err(FlowError::Definition(format!("node '{}': unknown node type '{}'", model.id, other)));
            }
        };

        Ok(Self {
            id: model.id.clone(),
            kind,
        })
    }

    /// Display text carried by this node, if its payload has any.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Message(p) => Some(&p.content),
            NodeKind::Branch(p) => Some(&p.content),
            NodeKind::SlotFilling(p) => Some(&p.content),
            NodeKind::Form(p) => Some(&p.title),
            NodeKind::End(p) => Some(&p.content),
            _ => None,
        }
    }
}

/// A quick-reply button offered by a message or branch node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Value matched against edge source handles when chosen.
    pub value: String,
    /// Label shown to the user.
    #[serde(default)]
    pub display: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

/// How a branch node picks its outgoing edge.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationType {
    /// Wait for the user to press a reply button.
    #[default]
    Button,
    ButtonClick,
    /// Evaluate conditions against slots and advance automatically.
    Condition,
    SlotCondition,
}

/// One authored condition of a branch node. `value` may itself contain
/// `{path}` placeholders, resolved against slots before evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCondition {
    pub slot: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchPayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub evaluation_type: EvaluationType,
    #[serde(default)]
    pub conditions: Vec<BranchCondition>,
    /// Positionally paired with `conditions`: the reply at the index of the
    /// first matching condition supplies the edge handle.
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotFillingPayload {
    #[serde(default)]
    pub content: String,
    pub target_slot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub elements: Vec<FormElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationRule>,
}

/// One `{key, value}` assignment of a setSlot node. A string value of the
/// literal form `{{slotName}}` is resolved by a single lookup in the current
/// slots before assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetSlotPayload {
    #[serde(default)]
    pub assignments: Vec<SlotAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayPayload {
    /// Suspension time in milliseconds.
    #[serde(default, alias = "delay_ms", alias = "delayMs")]
    pub duration: Option<u64>,
}

/// A single HTTP call: every string field supports `{path}` templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCall {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default)]
    pub response_mapping: Vec<ResponseMapping>,
}

impl Default for ApiCall {
    fn default() -> Self {
        Self {
            method: default_method(),
            url: String::new(),
            headers: HashMap::new(),
            body: None,
            params: HashMap::new(),
            response_mapping: Vec::new(),
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// Copies `path` out of the JSON response into `slot`. An unresolvable path
/// leaves the slot untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMapping {
    pub path: String,
    pub slot: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPayload {
    #[serde(flatten)]
    pub call: ApiCall,
    #[serde(default)]
    pub is_multi: bool,
    #[serde(default)]
    pub apis: Vec<ApiCall>,
}

/// Keyword condition of an llm node: the first keyword found in the
/// lower-cased response supplies the edge handle (its `id`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordCondition {
    pub id: String,
    pub keyword: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmPayload {
    #[serde(default)]
    pub prompt_template: String,
    /// Slot that receives the response text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_var: Option<String>,
    #[serde(default)]
    pub conditions: Vec<KeywordCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndPayload {
    #[serde(default)]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn model(node_type: &str, data: Value) -> NodeModel {
        NodeModel {
            id: "n1".to_string(),
            node_type: node_type.to_string(),
            data,
        }
    }

    #[test]
    fn test_parse_message_node() {
        let node = Node::new(&model(
            "message",
            json!({"content": "Hello {name}", "replies": [{"value": "yes", "display": "Yes"}]}),
        ))
        .unwrap();
        match node.kind {
            NodeKind::Message(p) => {
                assert_eq!(p.content, "Hello {name}");
                assert_eq!(p.replies.len(), 1);
                assert_eq!(p.replies[0].value, "yes");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_parse_branch_node() {
        let node = Node::new(&model(
            "branch",
            json!({
                "evaluationType": "CONDITION",
                "conditions": [{"slot": "age", "operator": ">=", "value": "18"}],
                "replies": [{"value": "adult", "display": "Adult"}]
            }),
        ))
        .unwrap();
        match node.kind {
            NodeKind::Branch(p) => {
                assert_eq!(p.evaluation_type, EvaluationType::Condition);
                assert_eq!(p.conditions[0].operator, Operator::Ge);
                assert_eq!(p.replies[0].value, "adult");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_parse_set_slot_aliases() {
        for node_type in ["setSlot", "set-slot"] {
            let node = Node::new(&model(node_type, json!({"assignments": [{"key": "a", "value": 1}]}))).unwrap();
            assert!(matches!(node.kind, NodeKind::SetSlot(_)));
        }
    }

    #[test]
    fn test_parse_delay_aliases() {
        for data in [json!({"duration": 500}), json!({"delay_ms": 500}), json!({"delayMs": 500})] {
            let node = Node::new(&model("delay", data)).unwrap();
            match node.kind {
                NodeKind::Delay(p) => assert_eq!(p.duration, Some(500)),
                other => panic!("unexpected kind: {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_api_multi() {
        let node = Node::new(&model(
            "api",
            json!({
                "isMulti": true,
                "apis": [
                    {"method": "GET", "url": "https://a.example/{id}"},
                    {"method": "POST", "url": "https://b.example", "responseMapping": [{"path": "data.name", "slot": "name"}]}
                ]
            }),
        ))
        .unwrap();
        match node.kind {
            NodeKind::Api(p) => {
                assert!(p.is_multi);
                assert_eq!(p.apis.len(), 2);
                assert_eq!(p.apis[1].response_mapping[0].slot, "name");
            }
            other => panic!("unexpected kind: {:?}", other),
        }
    }

    #[test]
    fn test_parse_end_without_data() {
        let node = Node::new(&NodeModel {
            id: "end".to_string(),
            node_type: "end".to_string(),
            data: Value::Null,
        })
        .unwrap();
        assert!(matches!(node.kind, NodeKind::End(_)));
    }

    #[test]
    fn test_unknown_type_is_definition_error() {
        let err = Node::new(&model("teleport", json!({}))).unwrap_err();
        assert!(matches!(err, FlowError::Definition(_)));
        assert!(err.to_string().contains("teleport"));
    }
}
