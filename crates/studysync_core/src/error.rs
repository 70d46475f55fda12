//! crates/studysync_core/src/error.rs
//!
//! The domain error taxonomy surfaced to callers of the core operations.
//! Every variant is recoverable at the request boundary; none should crash
//! the surrounding process.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Missing or malformed input (empty task content, blank message, ...).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The user already owns an active study session.
    #[error("You already have an active study session.")]
    SessionAlreadyActive,

    /// No session with the given id, owner, and active status exists.
    #[error("No active session found to stop.")]
    NoActiveSession,

    #[error("Task not found.")]
    TaskNotFound,

    /// The task was already completed; points are never awarded twice.
    #[error("Task is already completed.")]
    TaskAlreadyCompleted,

    /// The ledger only accepts non-negative awards.
    #[error("Point award must be non-negative, got {0}")]
    InvalidAmount(i64),

    #[error("{0} not found.")]
    NotFound(String),

    /// A durable-store failure bubbled up through a port.
    #[error("Storage error: {0}")]
    Store(#[from] PortError),
}

pub type DomainResult<T> = Result<T, DomainError>;
