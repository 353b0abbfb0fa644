//! Per-node execution: side effects and the pause/advance decision.

mod api;
mod llm;

use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{
    Result,
    client::{HttpFetch, LlmClient},
    common::{Clock, Slots},
    eval::template,
    model::{EvaluationType, Node, NodeKind},
    session::SessionState,
};

/// How the auto-advance loop should treat a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeClass {
    /// Pause and wait for user input.
    Interactive,
    /// Execute side effects, then advance automatically.
    Auto,
    /// Conclude the scenario.
    Terminal,
}

/// Classify a node by its kind and payload. Nodes with zero outgoing edges
/// are additionally terminal regardless of class; the loop checks that.
pub fn classify(node: &Node) -> NodeClass {
    match &node.kind {
        NodeKind::Message(p) => {
            if p.replies.is_empty() {
                NodeClass::Auto
            } else {
                NodeClass::Interactive
            }
        }
        NodeKind::Branch(p) => match p.evaluation_type {
            EvaluationType::Button | EvaluationType::ButtonClick => NodeClass::Interactive,
            EvaluationType::Condition | EvaluationType::SlotCondition => NodeClass::Auto,
        },
        NodeKind::SlotFilling(_) | NodeKind::Form(_) => NodeClass::Interactive,
        NodeKind::SetSlot(_) | NodeKind::Delay(_) | NodeKind::Api(_) | NodeKind::Llm(_) => NodeClass::Auto,
        NodeKind::End(_) => NodeClass::Terminal,
    }
}

/// Result of executing one node.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Side effects done; resolve the next edge, matching `handle` if set.
    Advance { handle: Option<String> },
    /// An external call failed. The loop routes through an `onError` edge
    /// when one exists, otherwise the session fails.
    Failed { message: String },
    /// Interactive node rendered; pause for user input.
    AwaitInput,
}

/// Executes node side effects against a session.
pub struct NodeExecutor {
    http: Arc<dyn HttpFetch>,
    llm: Arc<dyn LlmClient>,
    clock: Arc<dyn Clock>,
}

impl NodeExecutor {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        llm: Arc<dyn LlmClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            llm,
            clock,
        }
    }

    /// Execute `node` against `session`, appending transcript entries and
    /// mutating slots as the node type dictates.
    pub async fn execute(
        &self,
        node: &Node,
        session: &mut SessionState,
    ) -> Result<StepOutcome> {
        debug!(session_id = %session.id, node_id = %node.id, "executing node");

        match &node.kind {
            NodeKind::Message(payload) => {
                session.push_bot_message(template::interpolate(&payload.content, &session.slots), Some(node.id.clone()));
                if payload.replies.is_empty() {
                    Ok(StepOutcome::Advance {
                        handle: None,
                    })
                } else {
                    Ok(StepOutcome::AwaitInput)
                }
            }
            NodeKind::Branch(payload) => match payload.evaluation_type {
                EvaluationType::Button | EvaluationType::ButtonClick => {
                    session.push_bot_message(template::interpolate(&payload.content, &session.slots), Some(node.id.clone()));
                    Ok(StepOutcome::AwaitInput)
                }
                EvaluationType::Condition | EvaluationType::SlotCondition => Ok(StepOutcome::Advance {
                    handle: None,
                }),
            },
            NodeKind::SlotFilling(payload) => {
                session.push_bot_message(template::interpolate(&payload.content, &session.slots), Some(node.id.clone()));
                Ok(StepOutcome::AwaitInput)
            }
            NodeKind::Form(payload) => {
                session.push_bot_message(template::interpolate(&payload.title, &session.slots), Some(node.id.clone()));
                Ok(StepOutcome::AwaitInput)
            }
            NodeKind::SetSlot(payload) => {
                session.slots = apply_assignments(&session.slots, payload);
                Ok(StepOutcome::Advance {
                    handle: None,
                })
            }
            NodeKind::Delay(payload) => {
                let millis = payload.duration.unwrap_or(0);
                if millis > 0 {
                    self.clock.sleep(Duration::from_millis(millis)).await;
                }
                Ok(StepOutcome::Advance {
                    handle: None,
                })
            }
            NodeKind::Api(payload) => Ok(api::run(self.http.as_ref(), payload, &mut session.slots).await),
            NodeKind::Llm(payload) => Ok(llm::run(self.llm.as_ref(), payload, node, session).await),
            NodeKind::End(payload) => {
                let content = template::interpolate(&payload.content, &session.slots);
                if !content.is_empty() {
                    session.push_bot_message(content, Some(node.id.clone()));
                }
                Ok(StepOutcome::Advance {
                    handle: None,
                })
            }
        }
    }
}

/// Apply a setSlot node's assignments to a copy of the slots.
///
/// A string value of the exact form `{{name}}` is replaced by the value of
/// slot `name` at the time of that assignment (single-level indirection); a
/// failed lookup keeps the literal text.
fn apply_assignments(
    slots: &Slots,
    payload: &crate::model::SetSlotPayload,
) -> Slots {
    let mut next = slots.clone();
    for assignment in &payload.assignments {
        let value = match &assignment.value {
            serde_json::Value::String(s) => match indirect_slot_name(s) {
                Some(name) => next.get(name).cloned().unwrap_or(serde_json::Value::String(s.clone())),
                None => serde_json::Value::String(s.clone()),
            },
            other => other.clone(),
        };
        next.set(&assignment.key, value);
    }
    next
}

fn indirect_slot_name(value: &str) -> Option<&str> {
    let inner = value.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.is_empty() || inner.contains(['{', '}']) { None } else { Some(inner) }
}
