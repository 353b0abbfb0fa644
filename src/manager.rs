//! Session manager: the engine facade.
//!
//! Owns every live session keyed by id, loads and caches scenario graphs,
//! and routes user input into the auto-advance loop. Session state is always
//! passed into the loop explicitly; there is no ambient global store.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::{
    FlowError, Result, ShareLock,
    client::{HttpFetch, HttpLlmClient, LlmClient, ReqwestFetcher, ScenarioProvider, StaticScenarios, UnconfiguredLlm},
    common::{Clock, MemCache, Slots, TokioClock},
    config::Config,
    eval::{condition, validate_input},
    executor::NodeExecutor,
    graph::GraphStore,
    locale::Locale,
    model::{NodeKind, ScenarioDefinition},
    runner::AutoAdvanceLoop,
    session::{FlowState, SessionId, SessionState, SessionStatus},
    store::{MemSessionStore, SessionPatch, SessionStore},
    transition,
};

/// Number of scenario graphs kept indexed in memory.
const SCENARIO_CACHE_SIZE: usize = 256;

/// User input submitted to a paused session.
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    /// Free text (slot-filling answers, typed messages).
    pub text: Option<String>,
    /// Reply value / output port chosen by the user.
    pub source_handle: Option<String>,
    /// Submitted form values, keyed by element name.
    pub form_data: Option<Slots>,
}

impl UserInput {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            text: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn reply(handle: impl Into<String>) -> Self {
        let handle = handle.into();
        Self {
            text: Some(handle.clone()),
            source_handle: Some(handle),
            ..Default::default()
        }
    }

    pub fn form(form_data: Slots) -> Self {
        Self {
            form_data: Some(form_data),
            ..Default::default()
        }
    }
}

struct SessionEntry {
    state: SessionState,
    graph: Arc<GraphStore>,
}

/// The engine facade: one instance manages any number of isolated sessions.
pub struct SessionManager {
    config: Config,
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn ScenarioProvider>,
    runner: AutoAdvanceLoop,
    scenarios: MemCache<String, Arc<GraphStore>>,
    sessions: ShareLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionManager {
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::new()
    }

    /// Fetch a scenario through the provider and start a session on it.
    pub async fn start_scenario(
        &self,
        scenario_id: &str,
        initial_slots: Slots,
    ) -> Result<SessionState> {
        let definition = self.provider.scenario(scenario_id).await?;
        self.start_session(&definition, initial_slots).await
    }

    /// Start a session on an already-fetched definition: create the durable
    /// record, seed slots, and advance from the start node until the flow
    /// pauses or concludes.
    ///
    /// If the first advance errors, the half-created durable record is
    /// deleted before the error propagates.
    pub async fn start_session(
        &self,
        definition: &ScenarioDefinition,
        initial_slots: Slots,
    ) -> Result<SessionState> {
        let graph = self.load_graph(definition)?;
        let session_id = self.store.create(&definition.id, &initial_slots).await?;

        let mut session = SessionState {
            id: session_id.clone(),
            scenario_id: graph.id().to_string(),
            scenario_name: graph.name().to_string(),
            status: SessionStatus::Active,
            slots: initial_slots,
            messages: Vec::new(),
            flow: Some(FlowState {
                current_node_id: graph.start_node().id.clone(),
                awaiting_input: false,
            }),
        };

        debug!(session_id = %session.id, scenario_id = %graph.id(), "session started");

        if let Err(e) = self.runner.advance(&graph, &mut session).await {
            if let Err(cleanup) = self.store.delete(&session_id).await {
                warn!(session_id = %session_id, error = %cleanup, "failed to clean up aborted session");
            }
            return Err(e);
        }

        self.insert_entry(session.clone(), graph);
        Ok(session)
    }

    /// Feed user input into a paused session and advance it.
    ///
    /// Validation failures return `Err(FlowError::Validation)` and leave the
    /// session untouched so the caller can re-prompt.
    pub async fn submit_input(
        &self,
        session_id: &str,
        input: UserInput,
    ) -> Result<SessionState> {
        let (mut session, graph) = self.entry(session_id)?;

        if session.status.is_terminal() {
            return Err(FlowError::Runtime(format!("session {} has already concluded", session_id)));
        }
        let Some(current_id) = session.current_node_id().map(str::to_string) else {
            return Err(FlowError::Runtime(format!("session {} has no current node", session_id)));
        };
        let node = graph.node_by_id(&current_id).ok_or(FlowError::Definition(format!("node '{}' not found in scenario '{}'", current_id, graph.id())))?;

        // Validation happens before any mutation; a failed rule must leave
        // the session exactly as it was.
        match &node.kind {
            NodeKind::SlotFilling(payload) => {
                let text = input.text.clone().unwrap_or_default();
                if let Some(rule) = &payload.validation {
                    let validity = validate_input(&text, rule, self.locale(), Utc::now().date_naive());
                    if !validity.is_valid {
                        return Err(FlowError::Validation(validity.message.unwrap_or_default()));
                    }
                }
                session.slots.set(&payload.target_slot, text);
            }
            NodeKind::Form(payload) => {
                let form_data = input.form_data.clone().unwrap_or_default();
                for element in &payload.elements {
                    if let Some(rule) = &element.validation {
                        let value = condition::string_form(form_data.get(&element.name));
                        let validity = validate_input(&value, rule, self.locale(), Utc::now().date_naive());
                        if !validity.is_valid {
                            return Err(FlowError::Validation(validity.message.unwrap_or_default()));
                        }
                    }
                }
                session.slots.merge(&form_data);
            }
            _ => {}
        }

        if let Some(handle) = &input.source_handle
            && let Some(message) = session.messages.iter_mut().rev().find(|m| m.node_id.as_deref() == Some(current_id.as_str()))
        {
            message.selected_option = Some(handle.clone());
        }

        if let Some(text) = &input.text
            && !text.is_empty()
        {
            session.push_user_message(text.clone());
        }

        let edges = graph.outgoing_edges(&current_id);
        match transition::resolve(node, edges, input.source_handle.as_deref(), &session.slots) {
            None => {
                self.runner.complete(&mut session).await?;
            }
            Some(edge) => {
                let target = edge.target.clone();
                if let Some(flow) = session.flow.as_mut() {
                    flow.current_node_id = target;
                    flow.awaiting_input = false;
                }
                self.runner.advance(&graph, &mut session).await?;
            }
        }

        self.update_entry(&session);
        Ok(session)
    }

    /// Attach the chosen reply value to the transcript entry rendered from
    /// `node_id` — the only permitted mutation of a past entry.
    pub async fn set_selected_option(
        &self,
        session_id: &str,
        node_id: &str,
        value: impl Into<String>,
    ) -> Result<SessionState> {
        let (mut session, _) = self.entry(session_id)?;

        let Some(message) = session.messages.iter_mut().rev().find(|m| m.node_id.as_deref() == Some(node_id)) else {
            return Err(FlowError::Runtime(format!("no transcript entry for node '{}' in session {}", node_id, session_id)));
        };
        message.selected_option = Some(value.into());

        self.store.patch(session_id, SessionPatch::new().with_messages(session.messages.clone())).await?;
        self.update_entry(&session);
        Ok(session)
    }

    /// Conclude a session explicitly (completion or cancelation).
    pub async fn end_session(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<SessionState> {
        let (mut session, _) = self.entry(session_id)?;
        session.conclude(status);
        self.store.patch(session_id, SessionPatch::new().with_status(status).with_flow(None)).await?;
        self.update_entry(&session);
        Ok(session)
    }

    /// Drop a session from active memory and delete its durable record.
    pub async fn delete_session(
        &self,
        session_id: &str,
    ) -> Result<()> {
        self.sessions.write().map_err(|e| FlowError::Runtime(e.to_string()))?.remove(session_id);
        self.store.delete(session_id).await
    }

    /// Current in-memory state of a session.
    pub fn session(
        &self,
        session_id: &str,
    ) -> Option<SessionState> {
        self.sessions.read().ok()?.get(session_id).map(|e| e.state.clone())
    }

    fn locale(&self) -> Locale {
        self.config.locale
    }

    fn load_graph(
        &self,
        definition: &ScenarioDefinition,
    ) -> Result<Arc<GraphStore>> {
        if let Some(graph) = self.scenarios.get(&definition.id) {
            return Ok(graph);
        }
        let graph = Arc::new(GraphStore::try_from(definition)?);
        trace!("\n{}", graph.schema());
        self.scenarios.set(definition.id.clone(), graph.clone());
        Ok(graph)
    }

    fn entry(
        &self,
        session_id: &str,
    ) -> Result<(SessionState, Arc<GraphStore>)> {
        let sessions = self.sessions.read().map_err(|e| FlowError::Runtime(e.to_string()))?;
        let entry = sessions.get(session_id).ok_or(FlowError::SessionNotFound(session_id.to_string()))?;
        Ok((entry.state.clone(), entry.graph.clone()))
    }

    fn insert_entry(
        &self,
        state: SessionState,
        graph: Arc<GraphStore>,
    ) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(
                state.id.clone(),
                SessionEntry {
                    state,
                    graph,
                },
            );
        }
    }

    fn update_entry(
        &self,
        state: &SessionState,
    ) {
        if let Ok(mut sessions) = self.sessions.write()
            && let Some(entry) = sessions.get_mut(&state.id)
        {
            entry.state = state.clone();
        }
    }
}

/// Builder wiring the manager's collaborators; every seam has a production
/// default.
pub struct SessionManagerBuilder {
    config: Config,
    store: Option<Arc<dyn SessionStore>>,
    http: Option<Arc<dyn HttpFetch>>,
    llm: Option<Arc<dyn LlmClient>>,
    provider: Option<Arc<dyn ScenarioProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            store: None,
            http: None,
            llm: None,
            provider: None,
            clock: None,
        }
    }
}

impl SessionManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn store(
        mut self,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        self.store = Some(store);
        self
    }

    pub fn http(
        mut self,
        http: Arc<dyn HttpFetch>,
    ) -> Self {
        self.http = Some(http);
        self
    }

    pub fn llm(
        mut self,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn provider(
        mut self,
        provider: Arc<dyn ScenarioProvider>,
    ) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> SessionManager {
        let config = self.config;
        let store = self.store.unwrap_or_else(|| Arc::new(MemSessionStore::new()));
        let http = self.http.unwrap_or_else(|| Arc::new(ReqwestFetcher::new(Duration::from_millis(config.http.timeout_ms))));
        let llm = self.llm.unwrap_or_else(|| match &config.llm.api_url {
            Some(url) => Arc::new(HttpLlmClient::new(url.clone(), Duration::from_millis(config.llm.timeout_ms))),
            None => Arc::new(UnconfiguredLlm),
        });
        let provider = self.provider.unwrap_or_else(|| Arc::new(StaticScenarios::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));

        let executor = NodeExecutor::new(http, llm, clock.clone());
        let runner = AutoAdvanceLoop::new(
            executor,
            store.clone(),
            clock,
            config.max_iterations,
            Duration::from_millis(config.auto_advance_delay_ms),
            config.locale,
        );

        SessionManager {
            config,
            store,
            provider,
            runner,
            scenarios: MemCache::new(SCENARIO_CACHE_SIZE),
            sessions: ShareLock::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        model::Edge,
        session::Sender,
        test_support::{NullClock, ScriptedLlm, StubFetch, definition, edge, node_model},
    };

    fn manager(store: Arc<MemSessionStore>) -> SessionManager {
        manager_with(store, StubFetch::empty(), ScriptedLlm::empty())
    }

    fn manager_with(store: Arc<MemSessionStore>, http: StubFetch, llm: ScriptedLlm) -> SessionManager {
        let mut config = Config::default();
        config.auto_advance_delay_ms = 0;
        SessionManager::builder().config(config).store(store).http(Arc::new(http)).llm(Arc::new(llm)).clock(Arc::new(NullClock)).build()
    }

    fn greeting_definition() -> ScenarioDefinition {
        definition(
            "greeting",
            Some("hello"),
            vec![
                node_model("hello", "message", json!({"content": "Hello {name}!", "replies": [{"value": "book", "display": "Book"}, {"value": "bye", "display": "Bye"}]})),
                node_model("book", "slotfilling", json!({"content": "Where to?", "targetSlot": "destination", "validation": {"type": "required"}})),
                node_model("confirm", "message", json!({"content": "Booked {destination}."})),
                node_model("farewell", "end", json!({"content": "Bye!"})),
            ],
            vec![
                edge("e1", "hello", "book", Some("book")),
                edge("e2", "hello", "farewell", Some("bye")),
                edge("e3", "book", "confirm", None),
                edge("e4", "confirm", "farewell", None),
            ],
        )
    }

    #[tokio::test]
    async fn test_full_session_walkthrough() {
        let store = Arc::new(MemSessionStore::new());
        let manager = manager(store.clone());

        let session = manager.start_session(&greeting_definition(), Slots::new().with("name", "Alice")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.awaiting_input());
        assert_eq!(session.current_node_id(), Some("hello"));
        assert_eq!(session.messages[0].text, "Hello Alice!");

        let session = manager.submit_input(&session.id, UserInput::reply("book")).await.unwrap();
        assert_eq!(session.current_node_id(), Some("book"));
        assert!(session.awaiting_input());
        // the reply was recorded on the prior bot message and as a user turn
        assert_eq!(session.messages[0].selected_option.as_deref(), Some("book"));
        assert!(session.messages.iter().any(|m| m.sender == Sender::User && m.text == "book"));

        let session = manager.submit_input(&session.id, UserInput::text("Jeju Island")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.slots.get("destination"), Some(&json!("Jeju Island")));
        let texts: Vec<_> = session.messages.iter().map(|m| m.text.as_str()).collect();
        assert!(texts.contains(&"Booked Jeju Island."));
        assert!(texts.contains(&"Bye!"));
        assert_eq!(store.get(&session.id).await.unwrap().status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_validation_failure_leaves_session_untouched() {
        let store = Arc::new(MemSessionStore::new());
        let manager = manager(store.clone());

        let session = manager.start_session(&greeting_definition(), Slots::new()).await.unwrap();
        let session = manager.submit_input(&session.id, UserInput::reply("book")).await.unwrap();
        let before = session.clone();
        let patches_before = store.patch_count();

        let err = manager.submit_input(&session.id, UserInput::text("   ")).await.unwrap_err();
        match err {
            FlowError::Validation(message) => assert_eq!(message, "This field is required."),
            other => panic!("unexpected error: {:?}", other),
        }

        // node did not advance, nothing was persisted, transcript unchanged
        let after = manager.session(&session.id).unwrap();
        assert_eq!(after, before);
        assert_eq!(store.patch_count(), patches_before);

        // a valid answer still goes through afterwards
        let session = manager.submit_input(&session.id, UserInput::text("Busan")).await.unwrap();
        assert_eq!(session.slots.get("destination"), Some(&json!("Busan")));
    }

    #[tokio::test]
    async fn test_branch_condition_routing_through_manager() {
        let definition = definition(
            "age-gate",
            Some("collect"),
            vec![
                node_model("collect", "slotfilling", json!({"content": "Your age?", "targetSlot": "age"})),
                node_model(
                    "gate",
                    "branch",
                    json!({
                        "evaluationType": "CONDITION",
                        "conditions": [{"slot": "age", "operator": ">=", "value": "18"}],
                        "replies": [{"value": "adult"}]
                    }),
                ),
                node_model("grown", "end", json!({"content": "welcome"})),
                node_model("minor", "end", json!({"content": "sorry"})),
            ],
            vec![
                edge("e1", "collect", "gate", None),
                edge("e2", "gate", "grown", Some("adult")),
                edge("e3", "gate", "minor", Some("default")),
            ],
        );

        let manager = manager(Arc::new(MemSessionStore::new()));
        let session = manager.start_session(&definition, Slots::new()).await.unwrap();
        let session = manager.submit_input(&session.id, UserInput::text("20")).await.unwrap();
        assert!(session.messages.iter().any(|m| m.text == "welcome"));

        let session = manager.start_session(&definition, Slots::new()).await.unwrap();
        let session = manager.submit_input(&session.id, UserInput::text("10")).await.unwrap();
        assert!(session.messages.iter().any(|m| m.text == "sorry"));
    }

    #[tokio::test]
    async fn test_form_submission_merges_validated_slots() {
        let definition = definition(
            "booking-form",
            Some("form"),
            vec![
                node_model(
                    "form",
                    "form",
                    json!({
                        "title": "Trip details",
                        "elements": [
                            {"type": "text", "name": "traveler", "label": "Name", "validation": {"type": "required"}},
                            {"type": "select", "name": "class", "label": "Class", "options": ["economy", "business"]}
                        ]
                    }),
                ),
                node_model("done", "end", json!({"content": "Thanks {traveler}"})),
            ],
            vec![edge("e1", "form", "done", None)],
        );

        let manager = manager(Arc::new(MemSessionStore::new()));
        let session = manager.start_session(&definition, Slots::new()).await.unwrap();

        let err = manager.submit_input(&session.id, UserInput::form(Slots::new().with("class", "economy"))).await.unwrap_err();
        assert!(matches!(err, FlowError::Validation(_)));

        let session = manager
            .submit_input(&session.id, UserInput::form(Slots::new().with("traveler", "Alice").with("class", "economy")))
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.slots.get("class"), Some(&json!("economy")));
        assert!(session.messages.iter().any(|m| m.text == "Thanks Alice"));
    }

    #[tokio::test]
    async fn test_llm_keyword_routing_through_manager() {
        let definition = definition(
            "triage",
            Some("classify"),
            vec![
                node_model(
                    "classify",
                    "llm",
                    json!({
                        "promptTemplate": "Classify: {request}",
                        "outputVar": "intent",
                        "conditions": [{"id": "refund-branch", "keyword": "refund"}]
                    }),
                ),
                node_model("refund", "end", json!({"content": "refund desk"})),
                node_model("general", "end", json!({"content": "front desk"})),
            ],
            vec![edge("e1", "classify", "refund", Some("refund-branch")), edge("e2", "classify", "general", None)],
        );

        let store = Arc::new(MemSessionStore::new());
        let llm = ScriptedLlm::complete(r#"{"slots":{"orderId":"A-7"}}|||I want a refund please"#);
        let manager = manager_with(store, StubFetch::empty(), llm);

        let session = manager.start_session(&definition, Slots::new().with("request", "refund me")).await.unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.slots.get("orderId"), Some(&json!("A-7")));
        assert_eq!(session.slots.get("intent"), Some(&json!("I want a refund please")));
        assert!(session.messages.iter().any(|m| m.text == "refund desk"));
    }

    #[tokio::test]
    async fn test_start_scenario_through_provider() {
        let provider = StaticScenarios::new().with(greeting_definition());
        let mut config = Config::default();
        config.auto_advance_delay_ms = 0;
        let manager = SessionManager::builder()
            .config(config)
            .store(Arc::new(MemSessionStore::new()))
            .http(Arc::new(StubFetch::empty()))
            .llm(Arc::new(ScriptedLlm::empty()))
            .provider(Arc::new(provider))
            .clock(Arc::new(NullClock))
            .build();

        let session = manager.start_scenario("greeting", Slots::new()).await.unwrap();
        assert_eq!(session.scenario_id, "greeting");
        assert!(matches!(manager.start_scenario("missing", Slots::new()).await, Err(FlowError::Definition(_))));
    }

    #[tokio::test]
    async fn test_start_session_rejects_unresolvable_start_node() {
        let broken = ScenarioDefinition {
            id: "broken".to_string(),
            name: String::new(),
            start_node_id: Some("ghost".to_string()),
            nodes: vec![node_model("real", "message", json!({}))],
            edges: Vec::<Edge>::new(),
        };
        let store = Arc::new(MemSessionStore::new());
        let manager = manager(store);
        assert!(matches!(manager.start_session(&broken, Slots::new()).await, Err(FlowError::Definition(_))));
    }

    #[tokio::test]
    async fn test_end_and_delete_session() {
        let store = Arc::new(MemSessionStore::new());
        let manager = manager(store.clone());

        let session = manager.start_session(&greeting_definition(), Slots::new()).await.unwrap();
        let ended = manager.end_session(&session.id, SessionStatus::Canceled).await.unwrap();
        assert_eq!(ended.status, SessionStatus::Canceled);
        assert!(ended.flow.is_none());
        assert_eq!(store.get(&session.id).await.unwrap().status, SessionStatus::Canceled);

        // concluded sessions refuse further input
        assert!(matches!(manager.submit_input(&session.id, UserInput::text("hi")).await, Err(FlowError::Runtime(_))));

        manager.delete_session(&session.id).await.unwrap();
        assert!(manager.session(&session.id).is_none());
        assert!(matches!(store.get(&session.id).await, Err(FlowError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_selected_option() {
        let store = Arc::new(MemSessionStore::new());
        let manager = manager(store.clone());

        let session = manager.start_session(&greeting_definition(), Slots::new()).await.unwrap();
        let updated = manager.set_selected_option(&session.id, "hello", "bye").await.unwrap();
        assert_eq!(updated.messages[0].selected_option.as_deref(), Some("bye"));
        assert_eq!(store.get(&session.id).await.unwrap().messages[0].selected_option.as_deref(), Some("bye"));

        assert!(manager.set_selected_option(&session.id, "nope", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let manager = manager(Arc::new(MemSessionStore::new()));
        let a = manager.start_session(&greeting_definition(), Slots::new().with("name", "A")).await.unwrap();
        let b = manager.start_session(&greeting_definition(), Slots::new().with("name", "B")).await.unwrap();

        let a = manager.submit_input(&a.id, UserInput::reply("book")).await.unwrap();
        let a = manager.submit_input(&a.id, UserInput::text("Jeju")).await.unwrap();
        assert_eq!(a.status, SessionStatus::Completed);

        // session b never saw a's slots or progress
        let b = manager.session(&b.id).unwrap();
        assert_eq!(b.status, SessionStatus::Active);
        assert_eq!(b.current_node_id(), Some("hello"));
        assert!(!b.slots.contains_key("destination"));
    }
}
