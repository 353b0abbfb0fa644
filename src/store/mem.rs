//! In-memory session store for tests and embedded use.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    FlowError, Result, ShareLock,
    common::Slots,
    session::{SessionId, SessionStatus},
    store::{SessionPatch, SessionRecord, SessionStore},
    utils::{self, time},
};

/// Map-backed `SessionStore`. Patches merge field-by-field, last write wins.
#[derive(Default)]
pub struct MemSessionStore {
    records: ShareLock<HashMap<SessionId, SessionRecord>>,
    patches: AtomicUsize,
}

impl MemSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of patches applied since creation.
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SessionStore for MemSessionStore {
    async fn create(
        &self,
        scenario_id: &str,
        initial_slots: &Slots,
    ) -> Result<SessionId> {
        let id = utils::longid();
        let now = time::time_millis();
        let record = SessionRecord {
            id: id.clone(),
            scenario_id: scenario_id.to_string(),
            status: SessionStatus::Active,
            slots: initial_slots.clone(),
            messages: Vec::new(),
            flow: None,
            create_time: now,
            update_time: now,
        };
        self.records.write().map_err(|e| FlowError::Store(e.to_string()))?.insert(id.clone(), record);
        Ok(id)
    }

    async fn get(
        &self,
        session_id: &str,
    ) -> Result<SessionRecord> {
        self.records
            .read()
            .map_err(|e| FlowError::Store(e.to_string()))?
            .get(session_id)
            .cloned()
            .ok_or(FlowError::SessionNotFound(session_id.to_string()))
    }

    async fn patch(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<()> {
        let mut records = self.records.write().map_err(|e| FlowError::Store(e.to_string()))?;
        let record = records.get_mut(session_id).ok_or(FlowError::SessionNotFound(session_id.to_string()))?;

        if let Some(messages) = patch.messages {
            record.messages = messages;
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(flow) = patch.flow {
            record.flow = flow;
        }
        if let Some(slots) = patch.slots {
            record.slots = slots;
        }
        record.update_time = time::time_millis();

        self.patches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(
        &self,
        session_id: &str,
    ) -> Result<()> {
        self.records.write().map_err(|e| FlowError::Store(e.to_string()))?.remove(session_id);
        Ok(())
    }
}
