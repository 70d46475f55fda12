//! crates/studysync_core/src/test_support.rs
//!
//! A small in-memory `StudyStore` used by the core's tests. It honors the
//! same contracts the Postgres adapter does: atomic point increments, the
//! (user, active) uniqueness constraint, and conditional status flips.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, Group, ScoreRow, SessionStatus, StudySession, Task, TaskStatus, User,
};
use crate::ports::{PortError, PortResult, StudyStore};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<StudySession>,
    tasks: Vec<Task>,
    groups: Vec<Group>,
    messages: Vec<ChatMessage>,
    auth_tokens: HashMap<String, Uuid>,
}

pub struct InMemoryStore {
    tables: Mutex<Tables>,
    fail_message_inserts: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            fail_message_inserts: AtomicBool::new(false),
        }
    }

    pub fn add_user(&self, name: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.tables.lock().unwrap().users.push(User {
            user_id,
            name: name.to_string(),
            points: 0,
        });
        user_id
    }

    pub fn add_user_with_points(&self, name: &str, points: i64) -> Uuid {
        let user_id = self.add_user(name);
        let mut tables = self.tables.lock().unwrap();
        tables
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .unwrap()
            .points = points;
        user_id
    }

    pub fn points_of(&self, user_id: Uuid) -> i64 {
        self.tables
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .map(|u| u.points)
            .unwrap_or(0)
    }

    pub fn active_session_count(&self, user_id: Uuid) -> usize {
        self.tables
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.status == SessionStatus::Active)
            .count()
    }

    /// Shifts a session's start time into the past so tests can observe a
    /// non-zero duration without sleeping.
    pub fn backdate_session(&self, session_id: Uuid, by: Duration) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(session) = tables.sessions.iter_mut().find(|s| s.id == session_id) {
            session.start_time -= by;
        }
    }

    pub fn fail_message_inserts(&self, fail: bool) {
        self.fail_message_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StudyStore for InMemoryStore {
    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.tables
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn increment_points(&self, user_id: Uuid, amount: i64) -> PortResult<i64> {
        let mut tables = self.tables.lock().unwrap();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.points += amount;
        Ok(user.points)
    }

    async fn insert_active_session(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
        task_id: Option<Uuid>,
        start_time: DateTime<Utc>,
    ) -> PortResult<StudySession> {
        let mut tables = self.tables.lock().unwrap();
        let already_active = tables
            .sessions
            .iter()
            .any(|s| s.user_id == user_id && s.status == SessionStatus::Active);
        if already_active {
            return Err(PortError::Conflict(format!(
                "User {} already has an active session",
                user_id
            )));
        }
        let session = StudySession {
            id: Uuid::new_v4(),
            user_id,
            group_id,
            task_id,
            start_time,
            end_time: None,
            duration_minutes: 0,
            status: SessionStatus::Active,
        };
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_active_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> PortResult<StudySession> {
        self.tables
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|s| {
                s.id == session_id && s.user_id == user_id && s.status == SessionStatus::Active
            })
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn complete_session_awarding(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
        points: i64,
    ) -> PortResult<StudySession> {
        let mut tables = self.tables.lock().unwrap();
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| {
                s.id == session_id && s.user_id == user_id && s.status == SessionStatus::Active
            })
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;
        session.end_time = Some(end_time);
        session.duration_minutes = duration_minutes;
        session.status = SessionStatus::Completed;
        let completed = session.clone();

        let user = tables
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.points += points;
        Ok(completed)
    }

    async fn insert_task(&self, user_id: Uuid, content: &str) -> PortResult<Task> {
        let task = Task {
            id: Uuid::new_v4(),
            user_id,
            content: content.to_string(),
            status: TaskStatus::Pending,
            created_at: Utc::now(),
        };
        self.tables.lock().unwrap().tasks.push(task.clone());
        Ok(task)
    }

    async fn get_task(&self, task_id: Uuid, user_id: Uuid) -> PortResult<Task> {
        self.tables
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| t.id == task_id && t.user_id == user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))
    }

    async fn tasks_for_user(&self, user_id: Uuid) -> PortResult<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tables
            .lock()
            .unwrap()
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.reverse(); // newest first, insertion order is creation order
        Ok(tasks)
    }

    async fn complete_task_awarding(
        &self,
        task_id: Uuid,
        user_id: Uuid,
        points: i64,
    ) -> PortResult<Task> {
        let mut tables = self.tables.lock().unwrap();
        let task = tables
            .tasks
            .iter_mut()
            .find(|t| {
                t.id == task_id && t.user_id == user_id && t.status == TaskStatus::Pending
            })
            .ok_or_else(|| PortError::NotFound(format!("Task {} not found", task_id)))?;
        task.status = TaskStatus::Completed;
        let completed = task.clone();

        let user = tables
            .users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.points += points;
        Ok(completed)
    }

    async fn delete_task(&self, task_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|t| !(t.id == task_id && t.user_id == user_id));
        if tables.tasks.len() == before {
            return Err(PortError::NotFound(format!("Task {} not found", task_id)));
        }
        Ok(())
    }

    async fn top_users_by_points(&self, limit: i64) -> PortResult<Vec<ScoreRow>> {
        let mut rows: Vec<ScoreRow> = self
            .tables
            .lock()
            .unwrap()
            .users
            .iter()
            .map(|u| ScoreRow {
                user_id: u.user_id,
                name: u.name.clone(),
                points: u.points,
            })
            .collect();
        rows.sort_by(|a, b| b.points.cmp(&a.points));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn group_members_by_points(&self, group_id: Uuid) -> PortResult<Vec<ScoreRow>> {
        let tables = self.tables.lock().unwrap();
        let group = tables
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;
        let mut rows: Vec<ScoreRow> = tables
            .users
            .iter()
            .filter(|u| group.members.contains(&u.user_id))
            .map(|u| ScoreRow {
                user_id: u.user_id,
                name: u.name.clone(),
                points: u.points,
            })
            .collect();
        rows.sort_by(|a, b| b.points.cmp(&a.points));
        Ok(rows)
    }

    async fn get_group(&self, group_id: Uuid) -> PortResult<Group> {
        self.tables
            .lock()
            .unwrap()
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))
    }

    async fn create_group(
        &self,
        name: &str,
        owner_id: Uuid,
        invite_code: &str,
    ) -> PortResult<Group> {
        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            members: vec![owner_id],
            invite_code: invite_code.to_string(),
        };
        self.tables.lock().unwrap().groups.push(group.clone());
        Ok(group)
    }

    async fn find_group_by_invite_code(&self, invite_code: &str) -> PortResult<Group> {
        self.tables
            .lock()
            .unwrap()
            .groups
            .iter()
            .find(|g| g.invite_code == invite_code)
            .cloned()
            .ok_or_else(|| PortError::NotFound("Group not found".to_string()))
    }

    async fn add_group_member(&self, group_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let group = tables
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;
        if !group.members.contains(&user_id) {
            group.members.push(user_id);
        }
        Ok(())
    }

    async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let group = tables
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| PortError::NotFound(format!("Group {} not found", group_id)))?;
        group.members.retain(|m| *m != user_id);
        Ok(())
    }

    async fn delete_group(&self, group_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.groups.len();
        tables.groups.retain(|g| g.id != group_id);
        if tables.groups.len() == before {
            return Err(PortError::NotFound(format!("Group {} not found", group_id)));
        }
        tables.messages.retain(|m| m.group_id != group_id);
        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.group_id == Some(group_id))
        {
            session.group_id = None;
        }
        Ok(())
    }

    async fn groups_for_user(&self, user_id: Uuid) -> PortResult<Vec<Group>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .groups
            .iter()
            .filter(|g| g.members.contains(&user_id))
            .cloned()
            .collect())
    }

    async fn insert_message(
        &self,
        group_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> PortResult<ChatMessage> {
        if self.fail_message_inserts.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("simulated write failure".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        let sender_name = tables
            .users
            .iter()
            .find(|u| u.user_id == sender_id)
            .map(|u| u.name.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", sender_id)))?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            group_id,
            sender_id,
            sender_name,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn messages_for_group(&self, group_id: Uuid, limit: i64) -> PortResult<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = self
            .tables
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect();
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn validate_auth_token(&self, token: &str) -> PortResult<Uuid> {
        self.tables
            .lock()
            .unwrap()
            .auth_tokens
            .get(token)
            .copied()
            .ok_or(PortError::Unauthorized)
    }
}
