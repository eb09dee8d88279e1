//! The query-routing and retrieval-orchestration pipeline.
pub mod answering;
pub mod finalize;
pub mod orchestrator;
pub mod retrieval;
pub mod router;

pub use answering::Answerer;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use retrieval::RetrieverAdapter;
pub use router::Router;
