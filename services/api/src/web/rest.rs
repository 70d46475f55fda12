//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the session, task, and leaderboard
//! endpoints, plus the master definition for the OpenAPI specification.

use crate::web::state::AppState;
use crate::web::{groups, ErrorBody, HttpError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studysync_core::domain::{
    CurrentUserStats, LeaderboardEntry, SessionStatus, StudySession, Task, TaskStatus,
};
use studysync_core::{ranking, sessions, tasks};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        start_session_handler,
        stop_session_handler,
        create_task_handler,
        list_tasks_handler,
        complete_task_handler,
        delete_task_handler,
        global_leaderboard_handler,
        group_leaderboard_handler,
        groups::create_group_handler,
        groups::join_group_handler,
        groups::my_groups_handler,
        groups::group_details_handler,
        groups::delete_group_handler,
        groups::leave_group_handler,
        groups::group_messages_handler,
    ),
    components(
        schemas(
            StartSessionRequest,
            SessionResponse,
            StopSessionResponse,
            CreateTaskRequest,
            TaskResponse,
            LeaderboardEntryResponse,
            CurrentUserStatsResponse,
            GroupLeaderboardResponse,
            groups::CreateGroupRequest,
            groups::JoinGroupRequest,
            groups::GroupResponse,
            groups::MessageResponse,
            ErrorBody,
        )
    ),
    tags(
        (name = "StudySync API", description = "Study sessions, tasks, leaderboards, and group chat.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Both links are optional; an empty JSON object starts a solo session.
#[derive(Deserialize, Default, ToSchema)]
pub struct StartSessionRequest {
    pub group_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub status: String,
}

impl From<StudySession> for SessionResponse {
    fn from(s: StudySession) -> Self {
        let status = match s.status {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        };
        Self {
            id: s.id,
            user_id: s.user_id,
            group_id: s.group_id,
            task_id: s.task_id,
            start_time: s.start_time,
            end_time: s.end_time,
            duration_minutes: s.duration_minutes,
            status: status.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StopSessionResponse {
    pub message: String,
    pub session: SessionResponse,
    pub points_awarded: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub content: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(t: Task) -> Self {
        let status = match t.status {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        };
        Self {
            id: t.id,
            content: t.content,
            status: status.to_string(),
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardEntryResponse {
    pub user_id: Uuid,
    pub name: String,
    pub points: i64,
    pub rank: u32,
}

impl From<LeaderboardEntry> for LeaderboardEntryResponse {
    fn from(e: LeaderboardEntry) -> Self {
        Self {
            user_id: e.user_id,
            name: e.name,
            points: e.points,
            rank: e.rank,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CurrentUserStatsResponse {
    pub rank: u32,
    pub points: i64,
    pub points_to_next: Option<i64>,
    pub points_to_be_first: Option<i64>,
}

impl From<CurrentUserStats> for CurrentUserStatsResponse {
    fn from(s: CurrentUserStats) -> Self {
        Self {
            rank: s.rank,
            points: s.points,
            points_to_next: s.points_to_next,
            points_to_be_first: s.points_to_be_first,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GroupLeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntryResponse>,
    pub current_user_stats: Option<CurrentUserStatsResponse>,
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Start a new study session for the authenticated user.
#[utoipa::path(
    post,
    path = "/sessions/start",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Study session started", body = SessionResponse),
        (status = 409, description = "The user already has an active session", body = ErrorBody)
    )
)]
pub async fn start_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let session =
        sessions::start(&*app_state.db, user_id, payload.group_id, payload.task_id).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// Stop an active study session, converting its duration into points.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/stop",
    params(("session_id" = Uuid, Path, description = "The session to stop")),
    responses(
        (status = 200, description = "Session stopped and points awarded", body = StopSessionResponse),
        (status = 404, description = "No matching active session", body = ErrorBody)
    )
)]
pub async fn stop_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (session, points) = sessions::stop(&*app_state.db, session_id, user_id).await?;
    let response = StopSessionResponse {
        message: format!(
            "Session stopped! You studied for {} minutes and earned {} points.",
            session.duration_minutes, points
        ),
        session: SessionResponse::from(session),
        points_awarded: points,
    };
    Ok(Json(response))
}

//=========================================================================================
// Task Handlers
//=========================================================================================

/// Create a new to-do item.
#[utoipa::path(
    post,
    path = "/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Empty task content", body = ErrorBody)
    )
)]
pub async fn create_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let task = tasks::create(&*app_state.db, user_id, &payload.content).await?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

/// List the authenticated user's tasks, newest first.
#[utoipa::path(
    get,
    path = "/tasks",
    responses((status = 200, description = "The user's tasks", body = [TaskResponse]))
)]
pub async fn list_tasks_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let tasks = tasks::list(&*app_state.db, user_id).await?;
    let response: Vec<TaskResponse> = tasks.into_iter().map(TaskResponse::from).collect();
    Ok(Json(response))
}

/// Mark a task completed. Awards the fixed task bounty exactly once.
#[utoipa::path(
    patch,
    path = "/tasks/{task_id}/complete",
    params(("task_id" = Uuid, Path, description = "The task to complete")),
    responses(
        (status = 200, description = "Task completed and points awarded", body = TaskResponse),
        (status = 404, description = "Task not found", body = ErrorBody),
        (status = 409, description = "Task is already completed", body = ErrorBody)
    )
)]
pub async fn complete_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let task = tasks::complete(&*app_state.db, task_id, user_id).await?;
    Ok(Json(TaskResponse::from(task)))
}

/// Delete a task at any status. Only the owner may delete it.
#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    params(("task_id" = Uuid, Path, description = "The task to delete")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ErrorBody)
    )
)]
pub async fn delete_task_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    tasks::delete(&*app_state.db, task_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Leaderboard Handlers
//=========================================================================================

/// The global leaderboard: top 100 users by points.
#[utoipa::path(
    get,
    path = "/leaderboard",
    responses((status = 200, description = "The global top 100", body = [LeaderboardEntryResponse]))
)]
pub async fn global_leaderboard_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let rows = app_state
        .db
        .top_users_by_points(ranking::GLOBAL_LEADERBOARD_LIMIT as i64)
        .await?;
    let entries = ranking::global_leaderboard(rows);
    let response: Vec<LeaderboardEntryResponse> =
        entries.into_iter().map(LeaderboardEntryResponse::from).collect();
    Ok(Json(response))
}

/// A group's leaderboard plus the requesting user's rank-distance stats.
#[utoipa::path(
    get,
    path = "/leaderboard/group/{group_id}",
    params(("group_id" = Uuid, Path, description = "The group to rank")),
    responses(
        (status = 200, description = "The group leaderboard", body = GroupLeaderboardResponse),
        (status = 404, description = "Group not found", body = ErrorBody)
    )
)]
pub async fn group_leaderboard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    // Surface an unknown group as 404 instead of an empty board.
    app_state.db.get_group(group_id).await?;

    let rows = app_state.db.group_members_by_points(group_id).await?;
    let board = ranking::group_leaderboard(rows, user_id);
    let response = GroupLeaderboardResponse {
        leaderboard: board
            .entries
            .into_iter()
            .map(LeaderboardEntryResponse::from)
            .collect(),
        current_user_stats: board.current_user.map(CurrentUserStatsResponse::from),
    };
    Ok(Json(response))
}
