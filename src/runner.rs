//! The auto-advance loop: drives a session through auto-passthrough nodes
//! until an interactive or terminal node is reached, bounded by an iteration
//! cap so a cyclic scenario cannot spin forever.

use std::{sync::Arc, time::Duration};

use tracing::{debug, error, warn};

use crate::{
    FlowError, Result,
    common::Clock,
    executor::{NodeClass, NodeExecutor, StepOutcome, classify},
    graph::GraphStore,
    locale::{self, Locale},
    model::{HANDLE_ON_ERROR, Node, NodeKind},
    session::{SessionState, SessionStatus},
    store::{SessionPatch, SessionStore},
    transition,
};

/// Bounded interpreter loop over a single session.
pub struct AutoAdvanceLoop {
    executor: NodeExecutor,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    max_iterations: u32,
    pace: Duration,
    locale: Locale,
}

impl AutoAdvanceLoop {
    pub fn new(
        executor: NodeExecutor,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        max_iterations: u32,
        pace: Duration,
        locale: Locale,
    ) -> Self {
        Self {
            executor,
            store,
            clock,
            max_iterations,
            pace,
            locale,
        }
    }

    /// Advance `session` from its current node until it pauses on an
    /// interactive node, concludes, or trips the loop guard.
    ///
    /// In-flow failures (external calls without an `onError` edge, the loop
    /// guard) conclude the session as `Failed` and return `Ok`; `Err` is
    /// reserved for infrastructure faults (store, definition).
    pub async fn advance(
        &self,
        graph: &GraphStore,
        session: &mut SessionState,
    ) -> Result<()> {
        let mut iterations = 0u32;

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                let err = FlowError::LoopGuard(self.max_iterations);
                error!(session_id = %session.id, node_id = ?session.current_node_id(), %err, "auto-advance loop guard tripped");
                session.push_bot_message(locale::loop_limit_exceeded(self.locale), None);
                session.conclude(SessionStatus::Failed);
                self.persist(session).await?;
                return Ok(());
            }

            let Some(current_id) = session.current_node_id().map(str::to_string) else {
                return Ok(());
            };
            let node = graph.node_by_id(&current_id).ok_or(FlowError::Definition(format!("node '{}' not found in scenario '{}'", current_id, graph.id())))?;
            let edges = graph.outgoing_edges(&current_id);

            if classify(node) == NodeClass::Terminal || edges.is_empty() {
                let outcome = self.run_node(graph, node, session).await?;
                if let StepOutcome::Failed {
                    message,
                } = outcome
                {
                    error!(session_id = %session.id, node_id = %current_id, error = %message, "external call failed on a terminal node");
                    session.push_bot_message(locale::scenario_failed(self.locale), None);
                    session.conclude(SessionStatus::Failed);
                    self.persist(session).await?;
                } else {
                    self.complete(session).await?;
                }
                return Ok(());
            }

            match classify(node) {
                NodeClass::Interactive => {
                    self.run_node(graph, node, session).await?;
                    if let Some(flow) = session.flow.as_mut() {
                        flow.awaiting_input = true;
                    }
                    session.status = SessionStatus::Active;
                    self.persist(session).await?;
                    debug!(session_id = %session.id, node_id = %current_id, "paused for user input");
                    return Ok(());
                }
                NodeClass::Auto | NodeClass::Terminal => {
                    let outcome = self.run_node(graph, node, session).await?;
                    session.status = SessionStatus::Active;

                    match outcome {
                        StepOutcome::Advance {
                            handle,
                        } => match transition::resolve(node, edges, handle.as_deref(), &session.slots) {
                            Some(edge) => {
                                self.move_to(session, edge.target.clone());
                                self.persist(session).await?;
                                if !self.pace.is_zero() {
                                    self.clock.sleep(self.pace).await;
                                }
                            }
                            None => {
                                self.complete(session).await?;
                                return Ok(());
                            }
                        },
                        StepOutcome::Failed {
                            message,
                        } => match edges.iter().find(|e| e.has_handle(HANDLE_ON_ERROR)) {
                            Some(edge) => {
                                warn!(session_id = %session.id, node_id = %current_id, error = %message, "external call failed, taking onError edge");
                                self.move_to(session, edge.target.clone());
                                self.persist(session).await?;
                            }
                            None => {
                                error!(session_id = %session.id, node_id = %current_id, error = %message, "external call failed with no onError edge");
                                session.push_bot_message(locale::scenario_failed(self.locale), None);
                                session.conclude(SessionStatus::Failed);
                                self.persist(session).await?;
                                return Ok(());
                            }
                        },
                        StepOutcome::AwaitInput => {
                            if let Some(flow) = session.flow.as_mut() {
                                flow.awaiting_input = true;
                            }
                            self.persist(session).await?;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Execute one node, surfacing `Generating` in the durable record while
    /// a suspending node (delay, api, llm) is in flight.
    async fn run_node(
        &self,
        graph: &GraphStore,
        node: &Node,
        session: &mut SessionState,
    ) -> Result<StepOutcome> {
        let suspends = matches!(node.kind, NodeKind::Delay(_) | NodeKind::Api(_) | NodeKind::Llm(_));
        if suspends {
            session.status = SessionStatus::Generating;
            self.store.patch(&session.id, SessionPatch::new().with_status(SessionStatus::Generating)).await?;
        }

        match self.executor.execute(node, session).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(session_id = %session.id, node_id = %node.id, scenario_id = %graph.id(), error = %e, "node execution failed");
                session.push_bot_message(locale::scenario_failed(self.locale), None);
                session.conclude(SessionStatus::Failed);
                self.persist(session).await?;
                Err(e)
            }
        }
    }

    fn move_to(
        &self,
        session: &mut SessionState,
        target: String,
    ) {
        if let Some(flow) = session.flow.as_mut() {
            flow.current_node_id = target;
            flow.awaiting_input = false;
        }
    }

    /// Conclude the session normally.
    pub(crate) async fn complete(
        &self,
        session: &mut SessionState,
    ) -> Result<()> {
        session.push_bot_message(locale::scenario_complete(self.locale), None);
        session.conclude(SessionStatus::Completed);
        self.persist(session).await?;
        debug!(session_id = %session.id, "scenario complete");
        Ok(())
    }

    pub(crate) async fn persist(
        &self,
        session: &SessionState,
    ) -> Result<()> {
        self.store.patch(&session.id, SessionPatch::from_session(session)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        common::Slots,
        model::ScenarioDefinition,
        session::FlowState,
        store::MemSessionStore,
        test_support::{NullClock, ScriptedLlm, StubFetch, definition, edge, node_model},
    };

    fn runner(store: Arc<MemSessionStore>, http: StubFetch) -> AutoAdvanceLoop {
        AutoAdvanceLoop::new(
            NodeExecutor::new(Arc::new(http), Arc::new(ScriptedLlm::empty()), Arc::new(NullClock)),
            store,
            Arc::new(NullClock),
            100,
            Duration::ZERO,
            Locale::En,
        )
    }

    async fn session_for(store: &MemSessionStore, graph: &GraphStore, slots: Slots) -> SessionState {
        let id = store.create(graph.id(), &slots).await.unwrap();
        SessionState {
            id,
            scenario_id: graph.id().to_string(),
            scenario_name: graph.name().to_string(),
            status: SessionStatus::Active,
            slots,
            messages: Vec::new(),
            flow: Some(FlowState {
                current_node_id: graph.start_node().id.clone(),
                awaiting_input: false,
            }),
        }
    }

    fn set_slot_chain(n: usize) -> ScenarioDefinition {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for i in 0..n {
            nodes.push(node_model(&format!("set{}", i), "setSlot", json!({"assignments": [{"key": format!("k{}", i), "value": i}]})));
        }
        nodes.push(node_model("ask", "message", json!({"content": "pick one", "replies": [{"value": "a", "display": "A"}]})));
        for i in 0..n {
            let target = if i + 1 < n { format!("set{}", i + 1) } else { "ask".to_string() };
            edges.push(edge(&format!("e{}", i), &format!("set{}", i), &target, None));
        }
        definition("chain", Some("set0"), nodes, edges)
    }

    #[tokio::test]
    async fn test_set_slot_chain_halts_at_interactive_node() {
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&set_slot_chain(3)).unwrap();
        let mut session = session_for(&store, &graph, Slots::new()).await;

        runner(store.clone(), StubFetch::empty()).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Active);
        assert!(session.awaiting_input());
        assert_eq!(session.current_node_id(), Some("ask"));
        for i in 0..3 {
            assert_eq!(session.slots.get(&format!("k{}", i)), Some(&json!(i)));
        }
        // the interactive message was rendered exactly once
        let renders = session.messages.iter().filter(|m| m.node_id.as_deref() == Some("ask")).count();
        assert_eq!(renders, 1);
        // the durable record tracked the walk: one patch per transition plus the pause
        let record = store.get(&session.id).await.unwrap();
        assert!(record.flow.as_ref().unwrap().awaiting_input);
        assert_eq!(store.patch_count(), 4);
    }

    #[tokio::test]
    async fn test_cycle_trips_loop_guard() {
        let definition = definition(
            "cycle",
            Some("a"),
            vec![node_model("a", "setSlot", json!({})), node_model("b", "setSlot", json!({}))],
            vec![edge("e1", "a", "b", None), edge("e2", "b", "a", None)],
        );
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&definition).unwrap();
        let mut session = session_for(&store, &graph, Slots::new()).await;

        runner(store.clone(), StubFetch::empty()).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.flow.is_none());
        assert_eq!(session.messages.last().unwrap().text, "Scenario loop limit exceeded");
        assert_eq!(store.get(&session.id).await.unwrap().status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_terminal_node_completes_session() {
        let definition = definition(
            "finish",
            Some("bye"),
            vec![node_model("bye", "end", json!({"content": "Goodbye {name}"}))],
            vec![],
        );
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&definition).unwrap();
        let mut session = session_for(&store, &graph, Slots::new().with("name", "Alice")).await;

        runner(store.clone(), StubFetch::empty()).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.flow.is_none());
        let texts: Vec<_> = session.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Goodbye Alice", "Scenario complete."]);
    }

    #[tokio::test]
    async fn test_zero_edge_auto_node_completes_session() {
        let definition = definition("lone", Some("only"), vec![node_model("only", "message", json!({"content": "solo"}))], vec![]);
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&definition).unwrap();
        let mut session = session_for(&store, &graph, Slots::new()).await;

        runner(store.clone(), StubFetch::empty()).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
    }

    fn api_definition(with_on_error: bool) -> ScenarioDefinition {
        let mut edges = vec![edge("ok", "call", "done", Some("onSuccess"))];
        if with_on_error {
            edges.push(edge("err", "call", "sorry", Some("onError")));
        }
        definition(
            "api-flow",
            Some("call"),
            vec![
                node_model(
                    "call",
                    "api",
                    json!({
                        "isMulti": true,
                        "apis": [
                            {"method": "GET", "url": "https://a.example"},
                            {"method": "GET", "url": "https://b.example"}
                        ]
                    }),
                ),
                node_model("done", "end", json!({"content": "ok"})),
                node_model("sorry", "end", json!({"content": "sorry"})),
            ],
            edges,
        )
    }

    #[tokio::test]
    async fn test_api_failure_takes_on_error_edge() {
        let http = StubFetch::new(vec![
            ("https://a.example", Ok(json!({}))),
            ("https://b.example", Err(FlowError::ExternalCall("boom".to_string()))),
        ]);
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&api_definition(true)).unwrap();
        let mut session = session_for(&store, &graph, Slots::new()).await;

        runner(store.clone(), http).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.slots.get("apiFailed"), Some(&json!(true)));
        assert_eq!(session.slots.get("apiError"), Some(&json!("boom")));
        // routed through the failure leg, not the success leg
        assert!(session.messages.iter().any(|m| m.text == "sorry"));
    }

    #[tokio::test]
    async fn test_api_failure_without_on_error_edge_fails_session() {
        let http = StubFetch::new(vec![
            ("https://a.example", Ok(json!({}))),
            ("https://b.example", Err(FlowError::ExternalCall("boom".to_string()))),
        ]);
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&api_definition(false)).unwrap();
        let mut session = session_for(&store, &graph, Slots::new()).await;

        runner(store.clone(), http).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert!(session.flow.is_none());
        assert_eq!(session.messages.last().unwrap().text, "An error occurred during the scenario.");
        assert_eq!(store.get(&session.id).await.unwrap().status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_api_success_takes_on_success_edge() {
        let http = StubFetch::new(vec![("https://a.example", Ok(json!({}))), ("https://b.example", Ok(json!({})))]);
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&api_definition(true)).unwrap();
        let mut session = session_for(&store, &graph, Slots::new()).await;

        runner(store.clone(), http).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.messages.iter().any(|m| m.text == "ok"));
        assert!(!session.slots.contains_key("apiFailed"));
    }

    #[tokio::test]
    async fn test_generating_status_surfaces_during_suspending_nodes() {
        let definition = definition(
            "pause",
            Some("wait"),
            vec![node_model("wait", "delay", json!({"duration": 5})), node_model("done", "end", json!({}))],
            vec![edge("e1", "wait", "done", None)],
        );
        let store = Arc::new(MemSessionStore::new());
        let graph = GraphStore::try_from(&definition).unwrap();
        let mut session = session_for(&store, &graph, Slots::new()).await;

        runner(store.clone(), StubFetch::empty()).advance(&graph, &mut session).await.unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        // generating was written before the delay, then superseded
        assert!(store.patch_count() >= 3);
    }
}
