//! services/api/src/web/groups.rs
//!
//! Group management endpoints: creating, joining by invite code, leaving,
//! and fetching chat history. The ledger and ranking logic only ever read
//! membership; these handlers are where it gets written.

use crate::web::state::AppState;
use crate::web::{ErrorBody, HttpError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studysync_core::domain::{ChatMessage, Group};
use studysync_core::error::DomainError;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct JoinGroupRequest {
    pub invite_code: String,
}

#[derive(Serialize, ToSchema)]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub invite_code: String,
    pub members: Vec<Uuid>,
}

impl From<Group> for GroupResponse {
    fn from(g: Group) -> Self {
        Self {
            id: g.id,
            name: g.name,
            owner_id: g.owner_id,
            invite_code: g.invite_code,
            members: g.members,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub group_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for MessageResponse {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            group_id: m.group_id,
            sender_id: m.sender_id,
            sender_name: m.sender_name,
            content: m.content,
            created_at: m.created_at,
        }
    }
}

/// Short, shareable invite code derived from a fresh v4 uuid.
fn new_invite_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Create a new study group. The creator becomes owner and first member.
#[utoipa::path(
    post,
    path = "/groups",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Empty group name", body = ErrorBody)
    )
)]
pub async fn create_group_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(DomainError::Validation("Group name cannot be empty.".to_string()).into());
    }
    let group = app_state
        .db
        .create_group(name, user_id, &new_invite_code())
        .await?;
    Ok((StatusCode::CREATED, Json(GroupResponse::from(group))))
}

/// Join a group by its invite code.
#[utoipa::path(
    post,
    path = "/groups/join",
    request_body = JoinGroupRequest,
    responses(
        (status = 200, description = "Joined the group", body = GroupResponse),
        (status = 404, description = "No group with that invite code", body = ErrorBody)
    )
)]
pub async fn join_group_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(payload): Json<JoinGroupRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let group = app_state
        .db
        .find_group_by_invite_code(payload.invite_code.trim())
        .await?;
    app_state.db.add_group_member(group.id, user_id).await?;
    let group = app_state.db.get_group(group.id).await?;
    Ok(Json(GroupResponse::from(group)))
}

/// List the groups the authenticated user belongs to.
#[utoipa::path(
    get,
    path = "/groups/mygroups",
    responses((status = 200, description = "The user's groups", body = [GroupResponse]))
)]
pub async fn my_groups_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let groups = app_state.db.groups_for_user(user_id).await?;
    let response: Vec<GroupResponse> = groups.into_iter().map(GroupResponse::from).collect();
    Ok(Json(response))
}

/// Fetch a single group's details. Members only; anyone else gets the same
/// not-found answer as for a group that does not exist.
#[utoipa::path(
    get,
    path = "/groups/{group_id}",
    params(("group_id" = Uuid, Path, description = "The group to fetch")),
    responses(
        (status = 200, description = "Group details", body = GroupResponse),
        (status = 404, description = "Group not found or requester is not a member", body = ErrorBody)
    )
)]
pub async fn group_details_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let group = app_state.db.get_group(group_id).await?;
    if !group.members.contains(&user_id) {
        return Err(DomainError::NotFound("Group".to_string()).into());
    }
    Ok(Json(GroupResponse::from(group)))
}

/// Leave a group. The owner cannot leave their own group.
#[utoipa::path(
    patch,
    path = "/groups/{group_id}/leave",
    params(("group_id" = Uuid, Path, description = "The group to leave")),
    responses(
        (status = 204, description = "Left the group"),
        (status = 400, description = "The owner cannot leave", body = ErrorBody),
        (status = 404, description = "Group not found", body = ErrorBody)
    )
)]
pub async fn leave_group_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let group = app_state.db.get_group(group_id).await?;
    if group.owner_id == user_id {
        return Err(
            DomainError::Validation("The group owner cannot leave the group.".to_string()).into(),
        );
    }
    app_state.db.remove_group_member(group_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a group, its membership rows and its chat history. Owner only;
/// any other caller gets the same not-found answer as for a missing group.
#[utoipa::path(
    delete,
    path = "/groups/{group_id}",
    params(("group_id" = Uuid, Path, description = "The group to delete")),
    responses(
        (status = 204, description = "Group deleted"),
        (status = 404, description = "Group not found or requester is not the owner", body = ErrorBody)
    )
)]
pub async fn delete_group_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let group = app_state.db.get_group(group_id).await?;
    if group.owner_id != user_id {
        return Err(DomainError::NotFound("Group".to_string()).into());
    }
    app_state.db.delete_group(group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A group's chat history in ascending timestamp order. Joining a room never
/// replays a backlog; clients fetch history here. Members only, with the
/// same not-found disguise as the details endpoint.
#[utoipa::path(
    get,
    path = "/groups/{group_id}/messages",
    params(("group_id" = Uuid, Path, description = "The group whose history to fetch")),
    responses(
        (status = 200, description = "Chat history, oldest first", body = [MessageResponse]),
        (status = 404, description = "Group not found or requester is not a member", body = ErrorBody)
    )
)]
pub async fn group_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(group_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let group = app_state.db.get_group(group_id).await?;
    if !group.members.contains(&user_id) {
        return Err(DomainError::NotFound("Group".to_string()).into());
    }
    let messages = app_state
        .db
        .messages_for_group(group_id, app_state.config.chat_history_limit)
        .await?;
    let response: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use studysync_core::ports::StudyStore;
    use studysync_core::test_support::InMemoryStore;

    fn test_state() -> (Arc<InMemoryStore>, Arc<AppState>) {
        let store = Arc::new(InMemoryStore::new());
        let config = Arc::new(Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            cors_origin: "http://localhost:5173".to_string(),
            chat_history_limit: 200,
        });
        let state = Arc::new(AppState::new(store.clone(), config));
        (store, state)
    }

    fn status_of(result: Result<impl IntoResponse, HttpError>) -> StatusCode {
        match result {
            Ok(response) => response.into_response().status(),
            Err(error) => error.into_response().status(),
        }
    }

    #[test]
    fn invite_codes_are_short_and_unique_enough() {
        let a = new_invite_code();
        let b = new_invite_code();
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn group_details_are_member_only() {
        let (store, state) = test_state();
        let owner = store.add_user("Avery");
        let outsider = store.add_user("Blair");
        let group = store.create_group("rust club", owner, "abc12345").await.unwrap();

        let member = group_details_handler(
            State(state.clone()),
            Extension(owner),
            Path(group.id),
        )
        .await;
        assert_eq!(status_of(member), StatusCode::OK);

        let stranger = group_details_handler(
            State(state),
            Extension(outsider),
            Path(group.id),
        )
        .await;
        // Non-members get the same answer as for a group that does not exist.
        assert_eq!(status_of(stranger), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chat_history_is_member_only() {
        let (store, state) = test_state();
        let owner = store.add_user("Avery");
        let outsider = store.add_user("Blair");
        let group = store.create_group("rust club", owner, "abc12345").await.unwrap();
        store.insert_message(group.id, owner, "hello").await.unwrap();

        let member = group_messages_handler(
            State(state.clone()),
            Extension(owner),
            Path(group.id),
        )
        .await;
        assert_eq!(status_of(member), StatusCode::OK);

        let stranger = group_messages_handler(
            State(state),
            Extension(outsider),
            Path(group.id),
        )
        .await;
        assert_eq!(status_of(stranger), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_the_owner_can_delete_a_group() {
        let (store, state) = test_state();
        let owner = store.add_user("Avery");
        let member = store.add_user("Blair");
        let group = store.create_group("rust club", owner, "abc12345").await.unwrap();
        store.add_group_member(group.id, member).await.unwrap();

        let as_member = delete_group_handler(
            State(state.clone()),
            Extension(member),
            Path(group.id),
        )
        .await;
        assert_eq!(status_of(as_member), StatusCode::NOT_FOUND);
        assert!(store.get_group(group.id).await.is_ok());

        let as_owner = delete_group_handler(
            State(state),
            Extension(owner),
            Path(group.id),
        )
        .await;
        assert_eq!(status_of(as_owner), StatusCode::NO_CONTENT);
        assert!(store.get_group(group.id).await.is_err());
    }

    #[tokio::test]
    async fn deleting_a_group_purges_its_chat_history() {
        let (store, state) = test_state();
        let owner = store.add_user("Avery");
        let group = store.create_group("rust club", owner, "abc12345").await.unwrap();
        store.insert_message(group.id, owner, "hello").await.unwrap();

        let deleted = delete_group_handler(
            State(state),
            Extension(owner),
            Path(group.id),
        )
        .await;
        assert_eq!(status_of(deleted), StatusCode::NO_CONTENT);
        assert!(store.messages_for_group(group.id, 200).await.unwrap().is_empty());
    }
}
