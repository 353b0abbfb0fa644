mod edge;
mod node;
mod scenario;

pub use edge::{Edge, EdgeId, HANDLE_DEFAULT, HANDLE_ON_ERROR, HANDLE_ON_SUCCESS};
pub use node::{
    ApiCall, ApiPayload, BranchCondition, BranchPayload, DelayPayload, EndPayload, EvaluationType, FormElement, FormPayload, KeywordCondition, LlmPayload, MessagePayload, Node, NodeId, NodeKind,
    NodeModel, Reply, ResponseMapping, SetSlotPayload, SlotAssignment, SlotFillingPayload,
};
pub use scenario::ScenarioDefinition;
