use std::time::Duration;

use thiserror::Error;

use crate::domain::SessionId;
use crate::session::SessionOutcome;

pub type DealbookResult<T> = Result<T, DealbookError>;

#[derive(Debug, Error)]
pub enum DealbookError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Errors raised while constructing engine configuration or score weights.
/// These always fail fast: a misconfigured engine never starts a session.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid score weights: {0}")]
    InvalidWeights(String),

    #[error("Configuration value out of range for `{knob}`: {value}")]
    OutOfRange { knob: &'static str, value: f64 },

    #[error("Negative budget: {0}")]
    NegativeBudget(f64),

    #[error("Missing cadence factor for '{0}'")]
    MissingCadenceFactor(String),

    #[error("Empty concession schedule")]
    EmptySchedule,
}

/// Errors related to request-side policy preconditions.
///
/// A request that violates static policy (e.g. a non-positive budget cap)
/// is refused before any session is created.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Request '{request}' violates static policy: {reason}")]
    InvalidRequest { request: String, reason: String },

    #[error("Shortlist is empty; nothing to negotiate")]
    EmptyShortlist,
}

/// Errors surfaced by a live negotiation session. Every variant carries the
/// session id, and the round number where one is meaningful.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session {session} is closed ({outcome}); further mutation is not allowed")]
    SessionClosed {
        session: SessionId,
        outcome: SessionOutcome,
    },

    #[error("Session {session}: no feasible offer at round {round}: {reason}")]
    StrategyInfeasible {
        session: SessionId,
        round: u32,
        reason: String,
    },

    #[error("Session {session}: round {round} deadline exceeded")]
    RoundTimeout { session: SessionId, round: u32 },

    #[error("Session {session} cancelled at round {round}")]
    Cancelled { session: SessionId, round: u32 },

    #[error("Session {session}: non-monotonic round number {round}")]
    RoundOrder { session: SessionId, round: u32 },

    #[error("Session task failed: {0}")]
    Join(String),
}

/// Errors from external collaborators (event bus, rationale synthesis).
///
/// Collaborator failures are retried with exponential backoff; after the
/// final attempt the engine degrades gracefully instead of aborting the
/// session (see the coordinator and rationale modules).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Event sink failure: {0}")]
    EventSink(String),

    #[error("Rationale source failure: {0}")]
    Rationale(String),

    #[error("Collaborator call timed out after {0:?}")]
    Timeout(Duration),
}
