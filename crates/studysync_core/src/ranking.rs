//! crates/studysync_core/src/ranking.rs
//!
//! The ranking engine: a pure function over a snapshot of (user, points)
//! rows. Ranks are 1-based and dense by position: ties receive distinct
//! consecutive ranks in the stable tie-break order, which is the store's
//! retrieval order for the scope. Recomputed from a fresh snapshot on every
//! read; at this scale (≤100 global rows, small groups) there is nothing to
//! gain from incremental maintenance.

use uuid::Uuid;

use crate::domain::{CurrentUserStats, GroupLeaderboard, LeaderboardEntry, ScoreRow};

/// How many entries the global leaderboard exposes.
pub const GLOBAL_LEADERBOARD_LIMIT: usize = 100;

/// Sorts the snapshot by points descending (stable, so the input order is
/// the tie-break) and assigns positional ranks.
pub fn rank(mut rows: Vec<ScoreRow>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| b.points.cmp(&a.points));
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| LeaderboardEntry {
            user_id: row.user_id,
            name: row.name,
            points: row.points,
            rank: index as u32 + 1,
        })
        .collect()
}

/// The global leaderboard: everyone, capped to the top 100 by points.
pub fn global_leaderboard(rows: Vec<ScoreRow>) -> Vec<LeaderboardEntry> {
    let mut entries = rank(rows);
    entries.truncate(GLOBAL_LEADERBOARD_LIMIT);
    entries
}

/// A group-scoped leaderboard plus the requesting user's rank-distance
/// stats. The stats are absent when the scope is empty or the user is not a
/// member of the scope; `points_to_next` and `points_to_be_first` are absent
/// when the user is first.
pub fn group_leaderboard(rows: Vec<ScoreRow>, requesting_user: Uuid) -> GroupLeaderboard {
    let entries = rank(rows);

    let current_user = entries
        .iter()
        .find(|e| e.user_id == requesting_user)
        .map(|me| {
            let mut points_to_next = None;
            let mut points_to_be_first = None;
            if me.rank > 1 {
                let above = &entries[me.rank as usize - 2];
                points_to_next = Some(above.points - me.points + 1);
                points_to_be_first = Some(entries[0].points - me.points + 1);
            }
            CurrentUserStats {
                rank: me.rank,
                points: me.points,
                points_to_next,
                points_to_be_first,
            }
        });

    GroupLeaderboard {
        entries,
        current_user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, points: i64) -> ScoreRow {
        ScoreRow {
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            points,
        }
    }

    #[test]
    fn ranks_are_dense_by_position_with_stable_ties() {
        // 50 (A), 50 (B), 30 (C) in retrieval order.
        let a = row("a", 50);
        let b = row("b", 50);
        let c = row("c", 30);
        let (a_id, b_id, c_id) = (a.user_id, b.user_id, c.user_id);

        let entries = rank(vec![a, b, c]);
        assert_eq!(entries.len(), 3);
        assert_eq!((entries[0].user_id, entries[0].rank), (a_id, 1));
        assert_eq!((entries[1].user_id, entries[1].rank), (b_id, 2));
        assert_eq!((entries[2].user_id, entries[2].rank), (c_id, 3));
    }

    #[test]
    fn ranking_is_deterministic_for_a_fixed_snapshot() {
        let rows: Vec<ScoreRow> = (0..20).map(|i| row(&format!("u{}", i), i % 5)).collect();
        let first = rank(rows.clone());
        let second = rank(rows);
        assert_eq!(first, second);
    }

    #[test]
    fn global_leaderboard_is_capped_at_one_hundred() {
        let rows: Vec<ScoreRow> = (0..150).map(|i| row(&format!("u{}", i), i)).collect();
        let entries = global_leaderboard(rows);
        assert_eq!(entries.len(), GLOBAL_LEADERBOARD_LIMIT);
        // Highest score first, rank 1.
        assert_eq!(entries[0].points, 149);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[99].rank, 100);
    }

    #[test]
    fn empty_scope_yields_empty_board_and_no_stats() {
        let board = group_leaderboard(Vec::new(), Uuid::new_v4());
        assert!(board.entries.is_empty());
        assert!(board.current_user.is_none());
    }

    #[test]
    fn tied_runner_up_needs_one_point_for_both_distances() {
        let a = row("a", 50);
        let b = row("b", 50);
        let c = row("c", 30);
        let b_id = b.user_id;

        let board = group_leaderboard(vec![a, b, c], b_id);
        let stats = board.current_user.unwrap();
        assert_eq!(stats.rank, 2);
        assert_eq!(stats.points, 50);
        assert_eq!(stats.points_to_next, Some(1));
        assert_eq!(stats.points_to_be_first, Some(1));
    }

    #[test]
    fn last_place_distances_count_from_the_entry_above_and_the_leader() {
        let a = row("a", 50);
        let b = row("b", 50);
        let c = row("c", 30);
        let c_id = c.user_id;

        let board = group_leaderboard(vec![a, b, c], c_id);
        let stats = board.current_user.unwrap();
        assert_eq!(stats.rank, 3);
        assert_eq!(stats.points_to_next, Some(21));
        assert_eq!(stats.points_to_be_first, Some(21));
    }

    #[test]
    fn sole_member_is_first_with_no_distances() {
        let only = row("solo", 40);
        let only_id = only.user_id;

        let board = group_leaderboard(vec![only], only_id);
        let stats = board.current_user.unwrap();
        assert_eq!(stats.rank, 1);
        assert_eq!(stats.points, 40);
        assert_eq!(stats.points_to_next, None);
        assert_eq!(stats.points_to_be_first, None);
    }

    #[tokio::test]
    async fn store_retrieval_order_is_the_tie_break() {
        use crate::ports::StudyStore;
        use crate::test_support::InMemoryStore;

        let store = InMemoryStore::new();
        let first = store.add_user_with_points("first-inserted", 50);
        let second = store.add_user_with_points("second-inserted", 50);
        let third = store.add_user_with_points("trailing", 30);

        let group = store.create_group("algebra", first, "code-1").await.unwrap();
        store.add_group_member(group.id, second).await.unwrap();
        store.add_group_member(group.id, third).await.unwrap();

        let rows = store.group_members_by_points(group.id).await.unwrap();
        let board = group_leaderboard(rows, second);
        let ids: Vec<Uuid> = board.entries.iter().map(|e| e.user_id).collect();
        assert_eq!(ids, vec![first, second, third]);
        assert_eq!(board.current_user.unwrap().rank, 2);
    }

    #[test]
    fn non_member_still_gets_the_board_but_no_stats() {
        let rows = vec![row("a", 10), row("b", 5)];
        let board = group_leaderboard(rows, Uuid::new_v4());
        assert_eq!(board.entries.len(), 2);
        assert!(board.current_user.is_none());
    }
}
