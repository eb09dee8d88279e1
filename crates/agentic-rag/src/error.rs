//! Turn failure taxonomy.
//!
//! A turn either completes fully or aborts with one of these variants, so
//! the caller can tell a dead vector index from a dead generation backend
//! from a sequencing bug. Failures with documented local fallbacks (router
//! classification, checkpoint availability) never reach this type.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TurnError {
    /// The vector index was unreachable, timed out, or returned garbage.
    #[error("vector retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    /// The generation backend failed outside the router, where no local
    /// fallback applies.
    #[error("generation backend failed: {0}")]
    Generation(#[source] anyhow::Error),

    /// A turn transition was attempted out of order.
    #[error("invalid turn transition: {0}")]
    Internal(&'static str),
}
