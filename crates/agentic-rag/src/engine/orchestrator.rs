//! Turn orchestration: Start → Routed → (Retrieved | Skipped) → Answered →
//! Finalized, with a single checkpoint commit at the end.
use crate::checkpoint::Checkpointer;
use crate::config::Config;
use crate::engine::answering::Answerer;
use crate::engine::finalize::finalize;
use crate::engine::retrieval::RetrieverAdapter;
use crate::engine::router::Router;
use crate::error::TurnError;
use crate::llm::{GenerationBackend, HttpGenerationClient};
use crate::memory::{ConversationState, Message};
use crate::retriever::{HttpVectorIndex, VectorIndex};
use crate::turn::{Route, Source, TurnRequest, TurnResult};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Start,
    Routed,
    Retrieved,
    Skipped,
    Answered,
    Finalized,
}

/// Explicit per-turn state value. Transitions consume the prior state and
/// return a new one; an out-of-order transition is an internal error, not
/// a panic.
#[derive(Debug)]
pub struct TurnState {
    phase: TurnPhase,
    route: Option<Route>,
    sources: Vec<Source>,
    raw_answer: Option<String>,
    answer: Option<String>,
}

impl TurnState {
    pub fn start() -> Self {
        Self {
            phase: TurnPhase::Start,
            route: None,
            sources: Vec::new(),
            raw_answer: None,
            answer: None,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn route(&self) -> Option<Route> {
        self.route
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn routed(self, route: Route) -> Result<Self, TurnError> {
        if self.phase != TurnPhase::Start {
            return Err(TurnError::Internal("routed() requires the Start phase"));
        }
        Ok(Self { phase: TurnPhase::Routed, route: Some(route), ..self })
    }

    pub fn retrieved(self, sources: Vec<Source>) -> Result<Self, TurnError> {
        if self.phase != TurnPhase::Routed || self.route != Some(Route::Retrieve) {
            return Err(TurnError::Internal("retrieved() requires a Retrieve-routed turn"));
        }
        Ok(Self { phase: TurnPhase::Retrieved, sources, ..self })
    }

    pub fn skipped(self) -> Result<Self, TurnError> {
        if self.phase != TurnPhase::Routed || self.route != Some(Route::Direct) {
            return Err(TurnError::Internal("skipped() requires a Direct-routed turn"));
        }
        Ok(Self { phase: TurnPhase::Skipped, sources: Vec::new(), ..self })
    }

    pub fn answered(self, raw_answer: String) -> Result<Self, TurnError> {
        if self.phase != TurnPhase::Retrieved && self.phase != TurnPhase::Skipped {
            return Err(TurnError::Internal("answered() requires Retrieved or Skipped"));
        }
        Ok(Self { phase: TurnPhase::Answered, raw_answer: Some(raw_answer), ..self })
    }

    pub fn finalized(self, answer: String) -> Result<Self, TurnError> {
        if self.phase != TurnPhase::Answered {
            return Err(TurnError::Internal("finalized() requires the Answered phase"));
        }
        Ok(Self { phase: TurnPhase::Finalized, answer: Some(answer), ..self })
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub temperature: f32,
    pub max_answer_tokens: u32,
    pub min_relevance_score: f32,
    pub history_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_answer_tokens: 1024,
            min_relevance_score: 0.3,
            history_window: 12,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            temperature: config.temperature,
            max_answer_tokens: config.max_answer_tokens,
            min_relevance_score: config.min_relevance_score,
            history_window: config.history_window,
        }
    }
}

pub struct Orchestrator {
    router: Router,
    retriever: RetrieverAdapter,
    answerer: Answerer,
    checkpointer: Checkpointer,
    session_locks: DashMap<String, Arc<Mutex<()>>>,
    history_window: usize,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        index: Arc<dyn VectorIndex>,
        checkpointer: Checkpointer,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            router: Router::new(backend.clone()),
            retriever: RetrieverAdapter::new(backend.clone(), index, config.min_relevance_score),
            answerer: Answerer::new(backend, config.temperature, config.max_answer_tokens),
            checkpointer,
            session_locks: DashMap::new(),
            history_window: config.history_window,
        }
    }

    /// Wires up the HTTP clients and checkpoint store from process config.
    pub fn from_config(config: &Config) -> Self {
        let backend: Arc<dyn GenerationBackend> = Arc::new(HttpGenerationClient::from_config(config));
        let index: Arc<dyn VectorIndex> = Arc::new(HttpVectorIndex::from_config(config));
        let checkpointer = Checkpointer::open(
            config.checkpoint_db.as_deref().map(std::path::Path::new),
        );
        Self::new(backend, index, checkpointer, OrchestratorConfig::from_config(config))
    }

    pub fn checkpointer(&self) -> &Checkpointer {
        &self.checkpointer
    }

    /// Runs one turn to completion.
    ///
    /// Turns for the same session id are serialized; the checkpoint commit
    /// happens exactly once, after the Finalized transition, or not at
    /// all. A failed turn leaves the persisted state untouched because
    /// everything up to the commit works on a local copy.
    pub async fn process_turn(&self, request: &TurnRequest) -> Result<TurnResult, TurnError> {
        let _guard = match request.session_id.as_deref() {
            Some(session_id) => Some(self.session_lock(session_id).lock_owned().await),
            None => None,
        };

        let mut state = match request.session_id.as_deref() {
            Some(session_id) => self.checkpointer.load(session_id).unwrap_or_default(),
            None => ConversationState::default(),
        };
        let turn_index = state.next_turn_index();
        let recent: Vec<Message> = state.recent_messages(self.history_window).to_vec();
        debug!(
            "Starting turn {} (session={:?}, {} prior messages)",
            turn_index,
            request.session_id,
            state.messages.len()
        );

        let turn = TurnState::start();

        let route = self.router.route(&request.query, &recent).await;
        let turn = turn.routed(route)?;

        let turn = match route {
            Route::Retrieve => {
                let sources = self
                    .retriever
                    .retrieve(
                        &request.query,
                        request.doc_ids.as_deref(),
                        request.k,
                        request.max_context_chars,
                    )
                    .await?;
                turn.retrieved(sources)?
            }
            Route::Direct => turn.skipped()?,
        };

        let raw_answer = self
            .answerer
            .answer(&request.query, route, turn.sources(), &recent, turn_index)
            .await?;
        let turn = turn.answered(raw_answer.clone())?;

        let answer = finalize(&raw_answer);
        let turn = turn.finalized(answer.clone())?;

        // Commit point: the only place this turn's effects become durable.
        state.push_turn(turn_index, request.query.clone(), answer.clone());
        state.last_route = Some(route);
        state.last_answer = Some(answer.clone());
        state.last_sources = turn.sources().to_vec();

        let memory_enabled = match request.session_id.as_deref() {
            Some(session_id) => self.checkpointer.save(session_id, &state),
            None => false,
        };

        info!(
            "Turn {} finalized: route={}, sources={}, memory_enabled={}",
            turn_index,
            route,
            turn.sources().len(),
            memory_enabled
        );

        Ok(TurnResult {
            answer,
            route,
            sources: turn.sources().to_vec(),
            memory_enabled,
            session_id: if memory_enabled { request.session_id.clone() } else { None },
        })
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
