//! crates/studysync_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a user tracked by the points ledger.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub name: String,
    /// Cumulative point total. Only ever increased by the ledger.
    pub points: i64,
}

/// The lifecycle status of a study session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Completed,
}

/// A timed study session. Created on start, mutated exactly once on stop.
#[derive(Debug, Clone)]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Set when the session was started from within a group.
    pub group_id: Option<Uuid>,
    /// Set when the session was started against a to-do item.
    pub task_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    /// Absent while the session is active.
    pub end_time: Option<DateTime<Utc>>,
    /// Whole minutes, zero until completion.
    pub duration_minutes: i64,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Completed,
}

/// A to-do item. Completing it awards a fixed number of points, once.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

/// A study group. Membership is managed outside the ledger/ranking logic;
/// the core treats the member set as a read-only fact.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub members: Vec<Uuid>,
    pub invite_code: String,
}

/// A chat message, immutable once created. The sender's display name is
/// resolved at persistence time so subscribers never need a second lookup.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One (user, points) pair as retrieved from the store. The retrieval order
/// of a batch of rows is the fixed tie-break order for ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRow {
    pub user_id: Uuid,
    pub name: String,
    pub points: i64,
}

/// A ranked leaderboard row. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub name: String,
    pub points: i64,
    /// 1-based, dense by position: ties get distinct consecutive ranks.
    pub rank: u32,
}

/// The requesting user's standing within a group leaderboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUserStats {
    pub rank: u32,
    pub points: i64,
    /// Points needed to pass the entry immediately above. Absent at rank 1.
    pub points_to_next: Option<i64>,
    /// Points needed to take first place. Absent at rank 1.
    pub points_to_be_first: Option<i64>,
}

/// A group-scoped leaderboard together with the requesting user's stats,
/// which are absent when the user is not part of the scope.
#[derive(Debug, Clone)]
pub struct GroupLeaderboard {
    pub entries: Vec<LeaderboardEntry>,
    pub current_user: Option<CurrentUserStats>,
}
