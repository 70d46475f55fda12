//! crates/studysync_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ChatMessage, Group, ScoreRow, StudySession, Task, User};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness or state constraint rejected the write (e.g. a second
    /// active session for the same user).
    #[error("Conflicting state: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Durable Store Port
//=========================================================================================

/// The durable-store port. Implementations must provide atomic
/// increment-by-amount on the point total, a uniqueness-constraint-backed
/// insert for active sessions, and ordered range queries for leaderboard
/// scopes and message history.
#[async_trait]
pub trait StudyStore: Send + Sync {
    // --- Users & Points Ledger ---
    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    /// Atomically adds `amount` to the user's point total and returns the new
    /// total. This is a single read-modify-write in the store, never a
    /// read-then-write pair in the caller.
    async fn increment_points(&self, user_id: Uuid, amount: i64) -> PortResult<i64>;

    // --- Study Sessions ---
    /// Inserts a new active session. Fails with `PortError::Conflict` if the
    /// user already owns an active session (enforced by a storage-level
    /// uniqueness constraint, not an application-level check).
    async fn insert_active_session(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
        task_id: Option<Uuid>,
        start_time: DateTime<Utc>,
    ) -> PortResult<StudySession>;

    /// Fetches a session owned by `user_id` that is still active. Fails with
    /// `PortError::NotFound` otherwise.
    async fn get_active_session(&self, session_id: Uuid, user_id: Uuid)
        -> PortResult<StudySession>;

    /// Completes the matching active session and credits `points` to its
    /// owner as a single atomic unit. Fails with `PortError::NotFound` if no
    /// session with this id, owner, and active status exists.
    async fn complete_session_awarding(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
        points: i64,
    ) -> PortResult<StudySession>;

    // --- Tasks ---
    async fn insert_task(&self, user_id: Uuid, content: &str) -> PortResult<Task>;

    async fn get_task(&self, task_id: Uuid, user_id: Uuid) -> PortResult<Task>;

    /// The owner's tasks, newest first.
    async fn tasks_for_user(&self, user_id: Uuid) -> PortResult<Vec<Task>>;

    /// Flips the matching *pending* task to completed and credits `points` to
    /// its owner as a single atomic unit. Fails with `PortError::NotFound` if
    /// no pending task with this id and owner exists; the condition on the
    /// pending status is the idempotency barrier against double awards.
    async fn complete_task_awarding(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        points: i64,
    ) -> PortResult<Task>;

    async fn delete_task(&self, task_id: Uuid, user_id: Uuid) -> PortResult<()>;

    // --- Leaderboard Scopes ---
    /// All users ordered by points descending, capped at `limit`. The
    /// returned order is the ranking tie-break order.
    async fn top_users_by_points(&self, limit: i64) -> PortResult<Vec<ScoreRow>>;

    /// The members of a group ordered by points descending.
    async fn group_members_by_points(&self, group_id: Uuid) -> PortResult<Vec<ScoreRow>>;

    // --- Groups ---
    async fn get_group(&self, group_id: Uuid) -> PortResult<Group>;

    async fn create_group(
        &self,
        name: &str,
        owner_id: Uuid,
        invite_code: &str,
    ) -> PortResult<Group>;

    async fn find_group_by_invite_code(&self, invite_code: &str) -> PortResult<Group>;

    async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> PortResult<()>;

    async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> PortResult<()>;

    /// Deletes a group and everything scoped to it (membership rows, chat
    /// history). Past study sessions keep existing with their group link
    /// cleared.
    async fn delete_group(&self, group_id: Uuid) -> PortResult<()>;

    async fn groups_for_user(&self, user_id: Uuid) -> PortResult<Vec<Group>>;

    // --- Chat Messages ---
    /// Persists a message with a server-assigned id and timestamp and returns
    /// it enriched with the sender's display name.
    async fn insert_message(
        &self,
        group_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage>;

    /// The group's message history in ascending timestamp order.
    async fn messages_for_group(&self, group_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>>;

    // --- Identity ---
    /// Resolves an opaque auth token (issued by the external identity
    /// provider) to a verified user id.
    async fn validate_auth_token(&self, token: &str) -> PortResult<Uuid>;
}
