//! crates/studysync_core/src/tasks.rs
//!
//! The to-do tracker. Completing a task awards a fixed number of points,
//! at most once per task.

use uuid::Uuid;

use crate::domain::Task;
use crate::error::{DomainError, DomainResult};
use crate::ledger::POINTS_PER_TASK;
use crate::ports::{PortError, StudyStore};

/// Creates a new pending task. Content must be non-empty after trimming.
pub async fn create(store: &dyn StudyStore, user_id: Uuid, content: &str) -> DomainResult<Task> {
    let content = content.trim();
    if content.is_empty() {
        return Err(DomainError::Validation(
            "Task content cannot be empty.".to_string(),
        ));
    }
    let task = store.insert_task(user_id, content).await?;
    Ok(task)
}

/// The owner's tasks, newest first.
pub async fn list(store: &dyn StudyStore, user_id: Uuid) -> DomainResult<Vec<Task>> {
    Ok(store.tasks_for_user(user_id).await?)
}

/// Marks a task completed and awards the fixed task bounty to its owner.
///
/// The store flips the status conditionally on it still being pending, with
/// the point credit in the same atomic unit, so two racing completions award
/// at most once. The loser of the race is reported as `TaskAlreadyCompleted`.
pub async fn complete(store: &dyn StudyStore, task_id: Uuid, user_id: Uuid) -> DomainResult<Task> {
    let task = store
        .get_task(task_id, user_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => DomainError::TaskNotFound,
            other => DomainError::Store(other),
        })?;

    if task.status == crate::domain::TaskStatus::Completed {
        return Err(DomainError::TaskAlreadyCompleted);
    }

    match store
        .complete_task_awarding(task_id, user_id, POINTS_PER_TASK)
        .await
    {
        Ok(task) => Ok(task),
        // The pending precondition failed between the read above and the
        // conditional update, i.e. a concurrent completion won the race.
        Err(PortError::NotFound(_)) => Err(DomainError::TaskAlreadyCompleted),
        Err(e) => Err(e.into()),
    }
}

/// Deletes a task at any status. Only the owner may delete it.
pub async fn delete(store: &dyn StudyStore, task_id: Uuid, user_id: Uuid) -> DomainResult<()> {
    store
        .delete_task(task_id, user_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => DomainError::TaskNotFound,
            other => DomainError::Store(other),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;
    use crate::test_support::InMemoryStore;

    #[tokio::test]
    async fn create_trims_and_rejects_empty_content() {
        let store = InMemoryStore::new();
        let user = store.add_user("lee");

        let task = create(&store, user, "  read chapter 4  ").await.unwrap();
        assert_eq!(task.content, "read chapter 4");
        assert_eq!(task.status, TaskStatus::Pending);

        let err = create(&store, user, "   ").await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn completing_a_task_awards_the_fixed_bounty_once() {
        let store = InMemoryStore::new();
        let user = store.add_user("lee");
        let task = create(&store, user, "revise notes").await.unwrap();

        let completed = complete(&store, task.id, user).await.unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert_eq!(store.points_of(user), POINTS_PER_TASK);

        let err = complete(&store, task.id, user).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskAlreadyCompleted));
        // No second award.
        assert_eq!(store.points_of(user), POINTS_PER_TASK);
    }

    #[tokio::test]
    async fn completing_an_unknown_or_foreign_task_is_not_found() {
        let store = InMemoryStore::new();
        let owner = store.add_user("owner");
        let other = store.add_user("other");
        let task = create(&store, owner, "solo work").await.unwrap();

        let err = complete(&store, Uuid::new_v4(), owner).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound));

        // Ownership mismatch is reported identically to a missing task.
        let err = complete(&store, task.id, other).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound));
        assert_eq!(store.points_of(owner), 0);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let store = InMemoryStore::new();
        let user = store.add_user("lee");
        create(&store, user, "first").await.unwrap();
        create(&store, user, "second").await.unwrap();

        let tasks = list(&store, user).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].content, "second");
        assert_eq!(tasks[1].content, "first");
    }

    #[tokio::test]
    async fn delete_works_at_any_status_and_only_for_the_owner() {
        let store = InMemoryStore::new();
        let owner = store.add_user("owner");
        let other = store.add_user("other");

        let pending = create(&store, owner, "pending one").await.unwrap();
        let done = create(&store, owner, "done one").await.unwrap();
        complete(&store, done.id, owner).await.unwrap();

        let err = delete(&store, pending.id, other).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound));

        delete(&store, pending.id, owner).await.unwrap();
        delete(&store, done.id, owner).await.unwrap();
        assert!(list(&store, owner).await.unwrap().is_empty());
    }
}
