pub mod domain;
pub mod error;
pub mod ledger;
pub mod ports;
pub mod ranking;
pub mod rooms;
pub mod sessions;
pub mod tasks;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use domain::{
    ChatMessage, CurrentUserStats, Group, GroupLeaderboard, LeaderboardEntry, ScoreRow,
    SessionStatus, StudySession, Task, TaskStatus, User,
};
pub use error::{DomainError, DomainResult};
pub use ports::{PortError, PortResult, StudyStore};
pub use rooms::ChatRooms;
