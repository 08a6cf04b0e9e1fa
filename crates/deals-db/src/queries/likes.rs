use anyhow::Result;
use deals_types::models::TargetKind;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::models::LikeRow;
use crate::{Database, now};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub liked: bool,
    pub count: i64,
}

impl Database {
    // -- Likes --

    /// Toggle a like: removes it if present, inserts it otherwise.
    ///
    /// Delete-then-insert runs inside one immediate transaction and the
    /// insert is backed by a partial unique index, so concurrent toggles can
    /// never leave two rows for the same (user, target).
    pub fn toggle_like(
        &self,
        id: Uuid,
        user_id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
    ) -> Result<ToggleOutcome> {
        let column = kind.like_column();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let removed = tx.execute(
                &format!("DELETE FROM likes WHERE user_id = ?1 AND {column} = ?2"),
                [user_id.to_string(), target_id.to_string()],
            )?;

            if removed == 0 {
                tx.execute(
                    &format!("INSERT INTO likes (id, user_id, {column}, created_at) VALUES (?1, ?2, ?3, ?4)"),
                    [id.to_string(), user_id.to_string(), target_id.to_string(), now()],
                )?;
            }

            let count = count_for(&tx, kind, target_id)?;
            tx.commit()?;

            Ok(ToggleOutcome {
                liked: removed == 0,
                count,
            })
        })
    }

    /// Strict like. Fails with a unique violation when the like already exists.
    pub fn insert_like(
        &self,
        id: Uuid,
        user_id: Uuid,
        kind: TargetKind,
        target_id: Uuid,
    ) -> Result<LikeRow> {
        let created_at = chrono::Utc::now();
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO likes (id, user_id, {}, created_at) VALUES (?1, ?2, ?3, ?4)",
                    kind.like_column()
                ),
                [
                    id.to_string(),
                    user_id.to_string(),
                    target_id.to_string(),
                    crate::timestamp(created_at),
                ],
            )?;
            Ok(LikeRow {
                id,
                user_id,
                target_kind: kind,
                target_id,
                created_at,
            })
        })
    }

    /// Returns false when there was no like to remove.
    pub fn delete_like(&self, user_id: Uuid, kind: TargetKind, target_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                &format!(
                    "DELETE FROM likes WHERE user_id = ?1 AND {} = ?2",
                    kind.like_column()
                ),
                [user_id.to_string(), target_id.to_string()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn count_likes(&self, kind: TargetKind, target_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| count_for(conn, kind, target_id))
    }

    pub fn has_liked(&self, user_id: Uuid, kind: TargetKind, target_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND {} = ?2)",
                    kind.like_column()
                ),
                [user_id.to_string(), target_id.to_string()],
                |r| r.get(0),
            )?;
            Ok(found)
        })
    }

    /// Whether a like target exists. Soft-deleted comments count as missing.
    pub fn like_target_exists(&self, kind: TargetKind, target_id: Uuid) -> Result<bool> {
        let sql = match kind {
            TargetKind::Comment => {
                "SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1 AND is_active = 1)".to_string()
            }
            other => format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", other.table()),
        };
        self.with_conn(|conn| {
            let found: bool = conn.query_row(&sql, [target_id.to_string()], |r| r.get(0))?;
            Ok(found)
        })
    }
}

fn count_for(conn: &Connection, kind: TargetKind, target_id: Uuid) -> Result<i64> {
    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM likes WHERE {} = ?1", kind.like_column()),
        [target_id.to_string()],
        |r| r.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;
    use crate::queries::test_support::{coupon, db, promotion, user};
    use deals_types::models::Role;
    use std::sync::Arc;

    #[test]
    fn toggle_twice_returns_to_unliked() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let promo = promotion(&db, alice, "Cheap TV");

        let first = db
            .toggle_like(Uuid::new_v4(), alice, TargetKind::Promotion, promo)
            .unwrap();
        assert_eq!(first, ToggleOutcome { liked: true, count: 1 });
        assert!(db.has_liked(alice, TargetKind::Promotion, promo).unwrap());
        assert_eq!(db.get_promotion(promo).unwrap().unwrap().likes_count, 1);

        let second = db
            .toggle_like(Uuid::new_v4(), alice, TargetKind::Promotion, promo)
            .unwrap();
        assert_eq!(second, ToggleOutcome { liked: false, count: 0 });
        assert!(!db.has_liked(alice, TargetKind::Promotion, promo).unwrap());
    }

    #[test]
    fn likes_are_per_target_kind() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let promo = promotion(&db, alice, "Cheap TV");
        let code = coupon(&db, alice, "save10");

        db.toggle_like(Uuid::new_v4(), alice, TargetKind::Promotion, promo)
            .unwrap();
        db.toggle_like(Uuid::new_v4(), alice, TargetKind::Coupon, code)
            .unwrap();

        assert_eq!(db.count_likes(TargetKind::Promotion, promo).unwrap(), 1);
        assert_eq!(db.count_likes(TargetKind::Coupon, code).unwrap(), 1);
        assert!(!db.has_liked(alice, TargetKind::Coupon, promo).unwrap());
    }

    #[test]
    fn strict_like_conflicts_on_duplicate() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let promo = promotion(&db, alice, "Cheap TV");

        db.insert_like(Uuid::new_v4(), alice, TargetKind::Promotion, promo)
            .unwrap();
        let err = db
            .insert_like(Uuid::new_v4(), alice, TargetKind::Promotion, promo)
            .unwrap_err();
        assert!(is_unique_violation(&err));

        assert!(db.delete_like(alice, TargetKind::Promotion, promo).unwrap());
        assert!(!db.delete_like(alice, TargetKind::Promotion, promo).unwrap());
    }

    #[test]
    fn unique_index_rejects_raw_duplicates() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let promo = promotion(&db, alice, "Cheap TV");

        let err = db
            .with_conn(|conn| {
                for _ in 0..2 {
                    conn.execute(
                        "INSERT INTO likes (id, user_id, promotion_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                        [Uuid::new_v4().to_string(), alice.to_string(), promo.to_string(), now()],
                    )?;
                }
                Ok(())
            })
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn concurrent_toggles_never_duplicate() {
        let db = Arc::new(db());
        let alice = user(&db, "alice", Role::User);
        let promo = promotion(&db, alice, "Cheap TV");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        db.toggle_like(Uuid::new_v4(), alice, TargetKind::Promotion, promo)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 200 toggles in total: an even number lands back on "not liked"
        assert_eq!(db.count_likes(TargetKind::Promotion, promo).unwrap(), 0);

        let outcome = db
            .toggle_like(Uuid::new_v4(), alice, TargetKind::Promotion, promo)
            .unwrap();
        assert_eq!(outcome, ToggleOutcome { liked: true, count: 1 });
    }

    #[test]
    fn deleted_comments_cannot_be_liked() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let promo = promotion(&db, alice, "Cheap TV");
        let comment = db
            .insert_comment(&crate::queries::NewComment {
                id: Uuid::new_v4(),
                content: "nice".into(),
                author_id: alice,
                target: deals_types::models::ListingRef::promotion(promo),
                parent_id: None,
            })
            .unwrap();

        assert!(db.like_target_exists(TargetKind::Comment, comment.id).unwrap());
        db.deactivate_comment(comment.id).unwrap();
        assert!(!db.like_target_exists(TargetKind::Comment, comment.id).unwrap());
        assert!(db.like_target_exists(TargetKind::Promotion, promo).unwrap());
        assert!(!db.like_target_exists(TargetKind::Coupon, promo).unwrap());
    }
}
