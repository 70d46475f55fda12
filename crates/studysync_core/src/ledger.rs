//! crates/studysync_core/src/ledger.rs
//!
//! The points ledger: the only writer of a user's cumulative point total.
//! Totals are strictly monotonic increasing; there is no subtraction
//! operation in this design.

use uuid::Uuid;

use crate::error::{DomainError, DomainResult};
use crate::ports::StudyStore;

/// Fixed award for completing a to-do item.
pub const POINTS_PER_TASK: i64 = 10;

/// Atomically adds `amount` to the user's point total and returns the new
/// total. The increment happens inside the store as a single
/// read-modify-write, so concurrent awards for the same user never lose
/// updates.
///
/// Session and task completion do not route through this function: their
/// credit has to land in the same transaction as the status flip, so
/// [`StudyStore::complete_session_awarding`] and
/// [`StudyStore::complete_task_awarding`] perform the identical increment
/// themselves. This entry point serves awards that stand alone.
pub async fn award_points(
    store: &dyn StudyStore,
    user_id: Uuid,
    amount: i64,
) -> DomainResult<i64> {
    if amount < 0 {
        return Err(DomainError::InvalidAmount(amount));
    }
    let new_total = store.increment_points(user_id, amount).await?;
    Ok(new_total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortError;
    use crate::test_support::InMemoryStore;

    #[tokio::test]
    async fn awards_accumulate_atomically() {
        let store = InMemoryStore::new();
        let user = store.add_user("dana");

        let total = award_points(&store, user, 5).await.unwrap();
        assert_eq!(total, 5);
        let total = award_points(&store, user, 0).await.unwrap();
        assert_eq!(total, 5);
        let total = award_points(&store, user, 12).await.unwrap();
        assert_eq!(total, 17);
    }

    #[tokio::test]
    async fn negative_amount_is_rejected_before_the_store_is_touched() {
        let store = InMemoryStore::new();
        let user = store.add_user("dana");

        let err = award_points(&store, user, -1).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidAmount(-1)));
        assert_eq!(store.points_of(user), 0);
    }

    #[tokio::test]
    async fn unknown_user_surfaces_not_found_from_the_port() {
        let store = InMemoryStore::new();
        let err = award_points(&store, uuid::Uuid::new_v4(), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Store(PortError::NotFound(_))));
    }
}
