//! # Convoflow
//!
//! Convoflow is a lightweight, session-based conversation-flow engine written
//! in Rust. It interprets declarative scenario graphs (nodes + directed
//! edges): walking node-by-node, evaluating branch conditions, filling and
//! templating slots, invoking external HTTP/LLM collaborators, and deciding
//! at each step whether to pause for user input or keep advancing — bounded
//! by a loop guard against cyclic scenarios.
//!
//! ## Core Features
//!
//! - **Typed scenario graphs**: node payloads are parsed into a tagged union
//!   at load time, so unhandled node kinds are compile-time errors
//! - **Async execution**: powered by `tokio`; api fan-out, llm streaming and
//!   delays suspend cooperatively
//! - **Pluggable collaborators**: session persistence, HTTP fetch, LLM
//!   completion and scenario fetch are traits with production defaults
//! - **Isolated sessions**: every session owns its slots and transcript;
//!   the manager keys them by id
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use convoflow::{SessionManager, ScenarioDefinition, Slots, UserInput};
//!
//! let manager = SessionManager::builder().build();
//!
//! let definition = ScenarioDefinition::from_json(json_str)?;
//! let session = manager.start_session(&definition, Slots::new()).await?;
//! let session = manager.submit_input(&session.id, UserInput::text("Jeju")).await?;
//! ```

mod client;
mod common;
mod config;
mod error;
mod eval;
mod executor;
mod graph;
mod locale;
mod manager;
mod model;
mod runner;
mod session;
mod store;
mod transition;
mod utils;

use std::sync::{Arc, RwLock};

pub use client::{HttpFetch, HttpLlmClient, HttpScenarioProvider, LlmClient, LlmReply, LlmResponse, LlmStream, ReqwestFetcher, ScenarioProvider, StaticScenarios, UnconfiguredLlm, parse_llm_output};
pub use common::{Clock, MemCache, Slots, TokioClock};
pub use config::{Config, HttpConfig, LlmConfig};
pub use error::FlowError;
pub use eval::{DateRangeRule, Operator, PathSegment, SlotPath, ValidationKind, ValidationRule, Validity, evaluate_condition, interpolate, resolve_path, validate_input};
pub use executor::{NodeClass, NodeExecutor, StepOutcome, classify};
pub use graph::GraphStore;
pub use locale::Locale;
pub use manager::{SessionManager, SessionManagerBuilder, UserInput};
pub use model::*;
pub use runner::AutoAdvanceLoop;
pub use session::{FlowState, Message, Sender, SessionId, SessionState, SessionStatus};
pub use store::{MemSessionStore, SessionPatch, SessionRecord, SessionStore};
pub use transition::resolve as resolve_transition;

/// Result type alias for convoflow operations.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
