pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod memory;
pub mod retriever;
pub mod telemetry;
pub mod turn;

// Public API exports
pub use checkpoint::{CheckpointStore, Checkpointer};
pub use config::Config;
pub use engine::finalize::finalize;
pub use engine::orchestrator::{Orchestrator, OrchestratorConfig};
pub use error::TurnError;
pub use llm::{GenerationBackend, HttpGenerationClient, PromptMessage};
pub use memory::{ConversationState, Message, Role};
pub use retriever::{HttpVectorIndex, RetrievedChunk, VectorIndex};
pub use turn::{Route, Source, TurnRequest, TurnResult};
