//! Session state: one in-progress (or concluded) traversal of a scenario.

use serde::{Deserialize, Serialize};

use crate::{
    common::Slots,
    model::NodeId,
    utils::{self, time},
};

/// session id
pub type SessionId = String;

/// Lifecycle status of a session. Transitions are one-directional except
/// `Active` ↔ `Generating`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    /// An external call or delay is in flight; the caller shows a loading
    /// indicator.
    Generating,
    Completed,
    Failed,
    Canceled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Canceled)
    }
}

/// Graph position of a live session. `None` on the session once the status
/// is terminal.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlowState {
    pub current_node_id: NodeId,
    pub awaiting_input: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// One transcript entry. The transcript is append-only; the only permitted
/// mutation afterwards is attaching `selected_option` to a prior entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    #[serde(default)]
    pub text: String,
    /// Node this entry was rendered from, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Reply value the user picked on this entry's buttons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    pub timestamp: i64,
}

impl Message {
    pub fn bot(
        text: impl Into<String>,
        node_id: Option<NodeId>,
    ) -> Self {
        Self {
            id: utils::shortid(),
            sender: Sender::Bot,
            text: text.into(),
            node_id,
            selected_option: None,
            timestamp: time::time_millis(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: utils::shortid(),
            sender: Sender::User,
            text: text.into(),
            node_id: None,
            selected_option: None,
            timestamp: time::time_millis(),
        }
    }
}

/// Full state of one session. Owned by the `SessionManager`; mutated only by
/// the auto-advance loop and the input handler.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionState {
    pub id: SessionId,
    pub scenario_id: String,
    #[serde(default)]
    pub scenario_name: String,
    pub status: SessionStatus,
    pub slots: Slots,
    pub messages: Vec<Message>,
    /// Current graph position; cleared when the session concludes.
    /// Serialized as `state`, the field name persistence adapters see.
    #[serde(rename = "state", default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowState>,
}

impl SessionState {
    /// Whether the session is paused on an interactive node.
    pub fn awaiting_input(&self) -> bool {
        self.flow.as_ref().is_some_and(|f| f.awaiting_input)
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.flow.as_ref().map(|f| f.current_node_id.as_str())
    }

    pub fn push_bot_message(
        &mut self,
        text: impl Into<String>,
        node_id: Option<NodeId>,
    ) {
        self.messages.push(Message::bot(text, node_id));
    }

    pub fn push_user_message(
        &mut self,
        text: impl Into<String>,
    ) {
        self.messages.push(Message::user(text));
    }

    /// Conclude the session: terminal status, flow cleared.
    pub fn conclude(
        &mut self,
        status: SessionStatus,
    ) {
        self.status = status;
        self.flow = None;
    }
}
