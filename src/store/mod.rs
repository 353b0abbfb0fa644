//! Session persistence adapter.
//!
//! The engine consumes this contract; real deployments implement it against
//! their own storage. Patches are partial, idempotent, last-write-wins
//! records — one is written per completed transition, not transactionally
//! with the in-memory update.

mod mem;

use async_trait::async_trait;

use crate::{
    Result,
    common::Slots,
    session::{FlowState, Message, SessionId, SessionState, SessionStatus},
};

pub use mem::MemSessionStore;

/// Durable form of a session held by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub scenario_id: String,
    pub status: SessionStatus,
    pub slots: Slots,
    pub messages: Vec<Message>,
    pub flow: Option<FlowState>,
    pub create_time: i64,
    pub update_time: i64,
}

/// Partial update applied to a durable session record. `flow` distinguishes
/// "leave untouched" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub messages: Option<Vec<Message>>,
    pub status: Option<SessionStatus>,
    pub flow: Option<Option<FlowState>>,
    pub slots: Option<Slots>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full snapshot of a session's mutable fields.
    pub fn from_session(session: &SessionState) -> Self {
        Self {
            messages: Some(session.messages.clone()),
            status: Some(session.status),
            flow: Some(session.flow.clone()),
            slots: Some(session.slots.clone()),
        }
    }

    pub fn with_messages(
        mut self,
        messages: Vec<Message>,
    ) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn with_status(
        mut self,
        status: SessionStatus,
    ) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_flow(
        mut self,
        flow: Option<FlowState>,
    ) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn with_slots(
        mut self,
        slots: Slots,
    ) -> Self {
        self.slots = Some(slots);
        self
    }
}

/// Durable session storage consumed by the engine.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a durable record for a new session and return its id.
    async fn create(
        &self,
        scenario_id: &str,
        initial_slots: &Slots,
    ) -> Result<SessionId>;

    /// Fetch a session record. Missing ids are `FlowError::SessionNotFound`.
    async fn get(
        &self,
        session_id: &str,
    ) -> Result<SessionRecord>;

    /// Apply a partial update. Called after every completed transition.
    async fn patch(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<()>;

    /// Remove a session record (cleanup of abandoned or failed creation,
    /// or deletion of the owning conversation).
    async fn delete(
        &self,
        session_id: &str,
    ) -> Result<()>;
}
