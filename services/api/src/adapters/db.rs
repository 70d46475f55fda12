//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `StudyStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! The two correctness-critical contracts live here: point increments are a
//! single `UPDATE ... SET points = points + $n`, and the single-active-session
//! invariant is a partial unique index on (user_id) WHERE status = 'active',
//! whose violation is mapped to `PortError::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use studysync_core::domain::{
    ChatMessage, Group, ScoreRow, SessionStatus, StudySession, Task, TaskStatus, User,
};
use studysync_core::ports::{PortError, PortResult, StudyStore};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `StudyStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    name: String,
    points: i64,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            name: self.name,
            points: self.points,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    group_id: Option<Uuid>,
    task_id: Option<Uuid>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    duration_minutes: i64,
    status: String,
}
impl SessionRecord {
    fn to_domain(self) -> StudySession {
        let status = if self.status == "completed" {
            SessionStatus::Completed
        } else {
            SessionStatus::Active
        };
        StudySession {
            id: self.id,
            user_id: self.user_id,
            group_id: self.group_id,
            task_id: self.task_id,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            status,
        }
    }
}

#[derive(FromRow)]
struct TaskRecord {
    id: Uuid,
    user_id: Uuid,
    content: String,
    status: String,
    created_at: DateTime<Utc>,
}
impl TaskRecord {
    fn to_domain(self) -> Task {
        let status = if self.status == "completed" {
            TaskStatus::Completed
        } else {
            TaskStatus::Pending
        };
        Task {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            status,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct GroupRecord {
    id: Uuid,
    name: String,
    owner_id: Uuid,
    invite_code: String,
}
impl GroupRecord {
    fn to_domain(self, members: Vec<Uuid>) -> Group {
        Group {
            id: self.id,
            name: self.name,
            owner_id: self.owner_id,
            members,
            invite_code: self.invite_code,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    group_id: Uuid,
    sender_id: Uuid,
    sender_name: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            group_id: self.group_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ScoreRecord {
    user_id: Uuid,
    name: String,
    points: i64,
}
impl ScoreRecord {
    fn to_domain(self) -> ScoreRow {
        ScoreRow {
            user_id: self.user_id,
            name: self.name,
            points: self.points,
        }
    }
}

impl DbAdapter {
    async fn members_of(&self, group_id: Uuid) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM group_members WHERE group_id = $1 ORDER BY joined_at ASC",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)
    }
}

//=========================================================================================
// `StudyStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl StudyStore for DbAdapter {
    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT user_id, name, points FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn increment_points(&self, user_id: Uuid, amount: i64) -> PortResult<i64> {
        // A single read-modify-write in the database; concurrent awards for
        // the same user serialize on the row, so no update is lost.
        let new_total = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET points = points + $1 WHERE user_id = $2 RETURNING points",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(new_total)
    }

    async fn insert_active_session(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
        task_id: Option<Uuid>,
        start_time: DateTime<Utc>,
    ) -> PortResult<StudySession> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO study_sessions (id, user_id, group_id, task_id, start_time, status) \
             VALUES ($1, $2, $3, $4, $5, 'active') \
             RETURNING id, user_id, group_id, task_id, start_time, end_time, duration_minutes, status",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(group_id)
        .bind(task_id)
        .bind(start_time)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict(format!("User {} already has an active session", user_id))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<StudySession> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, group_id, task_id, start_time, end_time, duration_minutes, status \
             FROM study_sessions WHERE id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        Ok(record.to_domain())
    }

    async fn complete_session_awarding(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
        points: i64,
    ) -> PortResult<StudySession> {
        // The status flip and the point credit commit or roll back together,
        // so a crash between them can neither under- nor double-award.
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, SessionRecord>(
            "UPDATE study_sessions \
             SET end_time = $1, duration_minutes = $2, status = 'completed' \
             WHERE id = $3 AND user_id = $4 AND status = 'active' \
             RETURNING id, user_id, group_id, task_id, start_time, end_time, duration_minutes, status",
        )
        .bind(end_time)
        .bind(duration_minutes)
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        sqlx::query("UPDATE users SET points = points + $1 WHERE user_id = $2")
            .bind(points)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn insert_task(&self, user_id: Uuid, content: &str) -> PortResult<Task> {
        let record = sqlx::query_as::<_, TaskRecord>(
            "INSERT INTO tasks (id, user_id, content, status) VALUES ($1, $2, $3, 'pending') \
             RETURNING id, user_id, content, status, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_task(&self, task_id: Uuid, user_id: Uuid) -> PortResult<Task> {
        let record = sqlx::query_as::<_, TaskRecord>(
            "SELECT id, user_id, content, status, created_at FROM tasks \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;
        Ok(record.to_domain())
    }

    async fn tasks_for_user(&self, user_id: Uuid) -> PortResult<Vec<Task>> {
        let records = sqlx::query_as::<_, TaskRecord>(
            "SELECT id, user_id, content, status, created_at FROM tasks \
             WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn complete_task_awarding(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        points: i64,
    ) -> PortResult<Task> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Conditional on the pending status: of two racing completions,
        // exactly one sees a row here.
        let record = sqlx::query_as::<_, TaskRecord>(
            "UPDATE tasks SET status = 'completed' \
             WHERE id = $1 AND user_id = $2 AND status = 'pending' \
             RETURNING id, user_id, content, status, created_at",
        )
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;

        sqlx::query("UPDATE users SET points = points + $1 WHERE user_id = $2")
            .bind(points)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn delete_task(&self, task_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Task {} not found", task_id)));
        }
        Ok(())
    }

    async fn top_users_by_points(&self, limit: i64) -> PortResult<Vec<ScoreRow>> {
        let records = sqlx::query_as::<_, ScoreRecord>(
            "SELECT user_id, name, points FROM users ORDER BY points DESC, created_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn group_members_by_points(&self, group_id: Uuid) -> PortResult<Vec<ScoreRow>> {
        let records = sqlx::query_as::<_, ScoreRecord>(
            "SELECT u.user_id, u.name, u.points FROM users u \
             JOIN group_members m ON m.user_id = u.user_id \
             WHERE m.group_id = $1 \
             ORDER BY u.points DESC, m.joined_at ASC",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_group(&self, group_id: Uuid) -> PortResult<Group> {
        let record = sqlx::query_as::<_, GroupRecord>(
            "SELECT id, name, owner_id, invite_code FROM groups WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;
        let members = self.members_of(group_id).await?;
        Ok(record.to_domain(members))
    }

    async fn create_group(
        &self,
        name: &str,
        owner_id: Uuid,
        invite_code: &str,
    ) -> PortResult<Group> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, GroupRecord>(
            "INSERT INTO groups (id, name, owner_id, invite_code) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, owner_id, invite_code",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner_id)
        .bind(invite_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                PortError::Conflict("Invite code already in use".to_string())
            } else {
                unexpected(e)
            }
        })?;

        sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
            .bind(record.id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain(vec![owner_id]))
    }

    async fn find_group_by_invite_code(&self, invite_code: &str) -> PortResult<Group> {
        let record = sqlx::query_as::<_, GroupRecord>(
            "SELECT id, name, owner_id, invite_code FROM groups WHERE invite_code = $1",
        )
        .bind(invite_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound("Group not found".to_string()))?;
        let members = self.members_of(record.id).await?;
        Ok(record.to_domain(members))
    }

    async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id) VALUES ($1, $2) \
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_group(&self, group_id: Uuid) -> PortResult<()> {
        // Membership and messages go with the group via ON DELETE CASCADE;
        // past sessions keep their rows with the group link set to NULL.
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Group {} not found", group_id)));
        }
        Ok(())
    }

    async fn groups_for_user(&self, user_id: Uuid) -> PortResult<Vec<Group>> {
        let records = sqlx::query_as::<_, GroupRecord>(
            "SELECT g.id, g.name, g.owner_id, g.invite_code FROM groups g \
             JOIN group_members m ON m.group_id = g.id \
             WHERE m.user_id = $1 ORDER BY g.created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut groups = Vec::with_capacity(records.len());
        for record in records {
            let members = self.members_of(record.id).await?;
            groups.push(record.to_domain(members));
        }
        Ok(groups)
    }

    async fn insert_message(
        &self,
        group_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage> {
        // The insert and the sender-name enrichment happen in one statement;
        // subscribers receive the message exactly as persisted.
        let record = sqlx::query_as::<_, MessageRecord>(
            "WITH inserted AS ( \
                 INSERT INTO messages (id, group_id, sender_id, content) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING id, group_id, sender_id, content, created_at \
             ) \
             SELECT i.id, i.group_id, i.sender_id, u.name AS sender_name, i.content, i.created_at \
             FROM inserted i JOIN users u ON u.user_id = i.sender_id",
        )
        .bind(Uuid::new_v4())
        .bind(group_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn messages_for_group(&self, group_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT m.id, m.group_id, m.sender_id, u.name AS sender_name, m.content, m.created_at \
             FROM messages m JOIN users u ON u.user_id = m.sender_id \
             WHERE m.group_id = $1 ORDER BY m.created_at ASC LIMIT $2",
        )
        .bind(group_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn validate_auth_token(&self, token: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE token = $1 AND expires_at > NOW()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }
}
