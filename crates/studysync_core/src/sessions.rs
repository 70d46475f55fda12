//! crates/studysync_core/src/sessions.rs
//!
//! The study-session state machine. A session is created `active`, flipped to
//! `completed` exactly once, and never touched again. Stopping a session
//! converts its wall-clock duration into points, one point per whole minute.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::StudySession;
use crate::error::{DomainError, DomainResult};
use crate::ports::{PortError, StudyStore};

/// Starts a new study session for the user.
///
/// The single-active-session invariant is enforced by the store's uniqueness
/// constraint on (user, active), not by a query-then-insert pair; a
/// constraint violation surfaces here as `SessionAlreadyActive`.
pub async fn start(
    store: &dyn StudyStore,
    user_id: Uuid,
    group_id: Option<Uuid>,
    task_id: Option<Uuid>,
) -> DomainResult<StudySession> {
    match store
        .insert_active_session(user_id, group_id, task_id, Utc::now())
        .await
    {
        Ok(session) => Ok(session),
        Err(PortError::Conflict(_)) => Err(DomainError::SessionAlreadyActive),
        Err(e) => Err(e.into()),
    }
}

/// Stops an active session owned by the user.
///
/// Duration and points are derived here from server-side timestamps, never
/// trusted from the caller. The status flip and the point award happen as
/// one atomic store operation, conditional on the session still being
/// active, so a concurrent stop of the same session loses cleanly with
/// `NoActiveSession`.
pub async fn stop(
    store: &dyn StudyStore,
    session_id: Uuid,
    user_id: Uuid,
) -> DomainResult<(StudySession, i64)> {
    let session = store
        .get_active_session(session_id, user_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => DomainError::NoActiveSession,
            other => DomainError::Store(other),
        })?;

    let end_time = Utc::now();
    let duration = duration_minutes(session.start_time, end_time);
    let points = duration;

    let completed = store
        .complete_session_awarding(session_id, user_id, end_time, duration, points)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => DomainError::NoActiveSession,
            other => DomainError::Store(other),
        })?;

    Ok((completed, points))
}

/// Rounds the elapsed time between two instants to whole minutes, half-up:
/// 150 seconds is 3 minutes, 29 seconds is 0.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds().max(0);
    (millis + 30_000) / 60_000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionStatus;
    use crate::test_support::InMemoryStore;
    use chrono::Duration;

    #[test]
    fn duration_rounds_half_up() {
        let start = Utc::now();
        let cases = [
            (0, 0),
            (29, 0),
            (30, 1),   // exact half-minute rounds up
            (89, 1),
            (90, 2),
            (150, 3),  // the 2.5-minute example
            (3600, 60),
        ];
        for (secs, expected) in cases {
            let end = start + Duration::seconds(secs);
            assert_eq!(duration_minutes(start, end), expected, "{} secs", secs);
        }
    }

    #[test]
    fn duration_never_goes_negative() {
        let start = Utc::now();
        let end = start - Duration::seconds(10);
        assert_eq!(duration_minutes(start, end), 0);
    }

    #[tokio::test]
    async fn second_start_for_the_same_user_is_rejected() {
        let store = InMemoryStore::new();
        let user = store.add_user("amira");

        let first = start(&store, user, None, None).await.unwrap();
        assert_eq!(first.status, SessionStatus::Active);

        let err = start(&store, user, None, None).await.unwrap_err();
        assert!(matches!(err, DomainError::SessionAlreadyActive));
    }

    #[tokio::test]
    async fn different_users_can_hold_active_sessions_concurrently() {
        let store = InMemoryStore::new();
        let a = store.add_user("a");
        let b = store.add_user("b");

        start(&store, a, None, None).await.unwrap();
        start(&store, b, None, None).await.unwrap();
        assert_eq!(store.active_session_count(a), 1);
        assert_eq!(store.active_session_count(b), 1);
    }

    #[tokio::test]
    async fn stop_completes_the_session_and_awards_its_duration() {
        let store = InMemoryStore::new();
        let user = store.add_user("amira");

        let session = start(&store, user, None, None).await.unwrap();
        // Backdate the start so the stop observes a measurable duration.
        store.backdate_session(session.id, Duration::seconds(150));

        let (completed, points) = stop(&store, session.id, user).await.unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);
        assert_eq!(completed.duration_minutes, 3);
        assert!(completed.end_time.is_some());
        assert_eq!(points, 3);
        assert_eq!(store.points_of(user), 3);
        assert_eq!(store.active_session_count(user), 0);
    }

    #[tokio::test]
    async fn stopping_a_very_short_session_awards_zero_points() {
        let store = InMemoryStore::new();
        let user = store.add_user("amira");

        let session = start(&store, user, None, None).await.unwrap();
        let (completed, points) = stop(&store, session.id, user).await.unwrap();
        assert_eq!(completed.duration_minutes, 0);
        assert_eq!(points, 0);
        assert_eq!(store.points_of(user), 0);
    }

    #[tokio::test]
    async fn stopping_twice_fails_with_no_active_session() {
        let store = InMemoryStore::new();
        let user = store.add_user("amira");

        let session = start(&store, user, None, None).await.unwrap();
        stop(&store, session.id, user).await.unwrap();

        let err = stop(&store, session.id, user).await.unwrap_err();
        assert!(matches!(err, DomainError::NoActiveSession));
    }

    #[tokio::test]
    async fn stopping_someone_elses_session_looks_like_not_found() {
        let store = InMemoryStore::new();
        let owner = store.add_user("owner");
        let other = store.add_user("other");

        let session = start(&store, owner, None, None).await.unwrap();
        let err = stop(&store, session.id, other).await.unwrap_err();
        assert!(matches!(err, DomainError::NoActiveSession));
        // The owner's session is untouched.
        assert_eq!(store.active_session_count(owner), 1);
    }

    #[tokio::test]
    async fn a_user_can_start_again_after_stopping() {
        let store = InMemoryStore::new();
        let user = store.add_user("amira");

        let first = start(&store, user, None, None).await.unwrap();
        stop(&store, first.id, user).await.unwrap();
        let second = start(&store, user, Some(Uuid::new_v4()), None).await.unwrap();
        assert_eq!(second.status, SessionStatus::Active);
        assert!(second.group_id.is_some());
    }
}
