use anyhow::Result;
use chrono::{DateTime, Utc};
use deals_types::models::{Category, ListingRef};
use rusqlite::{Connection, Row, TransactionBehavior, params_from_iter};
use uuid::Uuid;

use super::moderation::apply_decision;
use super::{DecideOutcome, EditOutcome, ListingFilter, OptionalExt, Verdict};
use crate::models::{PromotionRow, enum_at, opt_ts_at, opt_uuid_at, ts_at, uuid_at};
use crate::{Database, now, timestamp};

pub struct NewPromotion {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub original_price: Option<f64>,
    pub price: f64,
    pub category: Category,
    pub store: String,
    pub owner_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Content and flag edits. `None` keeps the stored value; `Some(None)` clears
/// a nullable column. Status changes travel as a [`Verdict`].
#[derive(Debug, Default)]
pub struct PromotionChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub link: Option<String>,
    pub original_price: Option<Option<f64>>,
    pub price: Option<f64>,
    pub category: Option<Category>,
    pub store: Option<String>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub moderation_notes: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

const PROMOTION_SELECT: &str = "
    SELECT t.id, t.title, t.description, t.link, t.original_price, t.price, t.category, t.store,
           t.owner_id, u.username, t.moderator_id, t.status, t.rejection_reason, t.moderation_notes,
           t.is_active, t.is_featured, t.views_count, t.clicks_count,
           (SELECT COUNT(*) FROM likes l WHERE l.promotion_id = t.id),
           t.expires_at, t.created_at, t.updated_at, t.decided_at
    FROM promotions t
    JOIN users u ON u.id = t.owner_id";

impl Database {
    // -- Promotions --

    pub fn insert_promotion(&self, new: &NewPromotion) -> Result<PromotionRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO promotions
                    (id, title, description, link, original_price, price, category, store,
                     owner_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    new.id.to_string(),
                    new.title,
                    new.description,
                    new.link,
                    new.original_price,
                    new.price,
                    new.category.as_str(),
                    new.store,
                    new.owner_id.to_string(),
                    new.expires_at.map(timestamp),
                    now(),
                ],
            )?;
            query_promotion(conn, new.id)?
                .ok_or_else(|| anyhow::anyhow!("promotion {} vanished after insert", new.id))
        })
    }

    pub fn get_promotion(&self, id: Uuid) -> Result<Option<PromotionRow>> {
        self.with_conn(|conn| query_promotion(conn, id))
    }

    pub fn list_promotions(&self, filter: &ListingFilter) -> Result<Vec<PromotionRow>> {
        let (tail, params) = filter.to_sql(&["title", "description", "store"], true);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{PROMOTION_SELECT}{tail}"))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_promotion)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Applies `changes`, and `verdict` first when given, in one immediate
    /// transaction. A refused verdict leaves the row untouched.
    pub fn update_promotion(
        &self,
        id: Uuid,
        changes: &PromotionChanges,
        verdict: Option<Verdict<'_>>,
    ) -> Result<EditOutcome<PromotionRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(verdict) = verdict {
                match apply_decision(
                    &tx,
                    ListingRef::promotion(id),
                    verdict.moderator_id,
                    verdict.decision,
                    changes.moderation_notes.as_deref(),
                )? {
                    DecideOutcome::Decided(_) => {}
                    DecideOutcome::NotFound => return Ok(EditOutcome::NotFound),
                    DecideOutcome::Refused(refusal) => return Ok(EditOutcome::Refused(refusal)),
                }
            }

            let updated = tx.execute(
                "UPDATE promotions SET
                    title = COALESCE(?1, title),
                    description = CASE WHEN ?2 THEN ?3 ELSE description END,
                    link = COALESCE(?4, link),
                    original_price = CASE WHEN ?5 THEN ?6 ELSE original_price END,
                    price = COALESCE(?7, price),
                    category = COALESCE(?8, category),
                    store = COALESCE(?9, store),
                    expires_at = CASE WHEN ?10 THEN ?11 ELSE expires_at END,
                    moderation_notes = COALESCE(?12, moderation_notes),
                    is_featured = COALESCE(?13, is_featured),
                    is_active = COALESCE(?14, is_active),
                    updated_at = ?15
                 WHERE id = ?16",
                rusqlite::params![
                    changes.title,
                    changes.description.is_some(),
                    changes.description.clone().flatten(),
                    changes.link,
                    changes.original_price.is_some(),
                    changes.original_price.flatten(),
                    changes.price,
                    changes.category.map(Category::as_str),
                    changes.store,
                    changes.expires_at.is_some(),
                    changes.expires_at.flatten().map(timestamp),
                    changes.moderation_notes,
                    changes.is_featured,
                    changes.is_active,
                    now(),
                    id.to_string(),
                ],
            )?;
            if updated == 0 {
                return Ok(EditOutcome::NotFound);
            }

            let row = query_promotion(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("promotion {id} vanished during update"))?;
            tx.commit()?;
            Ok(EditOutcome::Saved(row))
        })
    }

    /// Hard delete. Comments and likes go with it.
    pub fn delete_promotion(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM promotions WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    pub fn record_promotion_view(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE promotions SET views_count = views_count + 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(updated > 0)
        })
    }

    /// Bumps the click counter of a published promotion and returns
    /// `(link, clicks_count)`. Pending, rejected and hidden ones are `None`.
    pub fn record_promotion_click(&self, id: Uuid) -> Result<Option<(String, i64)>> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE promotions SET clicks_count = clicks_count + 1
                 WHERE id = ?1 AND status = 'approved' AND is_active = 1
                 RETURNING link, clicks_count",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
    }
}

fn map_promotion(row: &Row<'_>) -> rusqlite::Result<PromotionRow> {
    Ok(PromotionRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        link: row.get(3)?,
        original_price: row.get(4)?,
        price: row.get(5)?,
        category: enum_at(row, 6)?,
        store: row.get(7)?,
        owner_id: uuid_at(row, 8)?,
        owner_username: row.get(9)?,
        moderator_id: opt_uuid_at(row, 10)?,
        status: enum_at(row, 11)?,
        rejection_reason: row.get(12)?,
        moderation_notes: row.get(13)?,
        is_active: row.get(14)?,
        is_featured: row.get(15)?,
        views_count: row.get(16)?,
        clicks_count: row.get(17)?,
        likes_count: row.get(18)?,
        expires_at: opt_ts_at(row, 19)?,
        created_at: ts_at(row, 20)?,
        updated_at: opt_ts_at(row, 21)?,
        decided_at: opt_ts_at(row, 22)?,
    })
}

pub(super) fn query_promotion(conn: &Connection, id: Uuid) -> Result<Option<PromotionRow>> {
    let mut stmt = conn.prepare_cached(&format!("{PROMOTION_SELECT} WHERE t.id = ?1"))?;
    stmt.query_row([id.to_string()], map_promotion).optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{db, page, promotion, user};
    use crate::queries::ListOrder;
    use chrono::Duration;
    use deals_types::models::{ModerationStatus, Role};
    use deals_types::moderation::{Decision, TransitionError};

    #[test]
    fn new_promotions_start_pending() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let id = promotion(&db, owner, "Cheap TV");

        let row = db.get_promotion(id).unwrap().unwrap();
        assert_eq!(row.status, ModerationStatus::Pending);
        assert_eq!(row.owner_username, "alice");
        assert_eq!(row.moderator_id, None);
        assert_eq!(row.likes_count, 0);
        assert!(row.is_active);
    }

    #[test]
    fn listing_filters_by_status_search_and_owner() {
        let db = db();
        let alice = user(&db, "alice", Role::User);
        let bob = user(&db, "bob", Role::User);
        let tv = promotion(&db, alice, "Cheap TV");
        promotion(&db, bob, "Blender 50% off");

        let pending = db
            .list_promotions(&ListingFilter {
                status: Some(ModerationStatus::Pending),
                ..page()
            })
            .unwrap();
        assert_eq!(pending.len(), 2);

        let approved = db
            .list_promotions(&ListingFilter {
                status: Some(ModerationStatus::Approved),
                ..page()
            })
            .unwrap();
        assert!(approved.is_empty());

        let search = db
            .list_promotions(&ListingFilter {
                search: Some("tv".into()),
                ..page()
            })
            .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].id, tv);

        // '%' in the query is literal
        let literal = db
            .list_promotions(&ListingFilter {
                search: Some("50%".into()),
                ..page()
            })
            .unwrap();
        assert_eq!(literal.len(), 1);

        let mine = db
            .list_promotions(&ListingFilter {
                owner_id: Some(alice),
                ..page()
            })
            .unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[test]
    fn live_filter_skips_expired_and_inactive() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let expired = promotion(&db, owner, "Old deal");
        let hidden = promotion(&db, owner, "Hidden deal");
        let live = promotion(&db, owner, "Live deal");

        let now = Utc::now();
        db.update_promotion(
            expired,
            &PromotionChanges {
                expires_at: Some(Some(now - Duration::days(1))),
                ..Default::default()
            },
            None,
        )
        .unwrap();
        db.update_promotion(
            hidden,
            &PromotionChanges {
                is_active: Some(false),
                ..Default::default()
            },
            None,
        )
        .unwrap();

        let rows = db
            .list_promotions(&ListingFilter {
                live_at: Some(now),
                order: ListOrder::Oldest,
                ..page()
            })
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![live]);
    }

    #[test]
    fn counters_and_delete() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let moderator = user(&db, "mod", Role::Moderator);
        let id = promotion(&db, owner, "Cheap TV");
        db.decide(ListingRef::promotion(id), moderator, &Decision::Approve, None)
            .unwrap();

        assert!(db.record_promotion_view(id).unwrap());
        let (link, clicks) = db.record_promotion_click(id).unwrap().unwrap();
        assert_eq!(link, "https://shop.example.com/item");
        assert_eq!(clicks, 1);

        let row = db.get_promotion(id).unwrap().unwrap();
        assert_eq!(row.views_count, 1);

        assert!(db.delete_promotion(id).unwrap());
        assert!(db.record_promotion_click(id).unwrap().is_none());
        assert!(!db.record_promotion_view(id).unwrap());
    }

    #[test]
    fn clicks_only_count_on_published_promotions() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let moderator = user(&db, "mod", Role::Moderator);
        let pending = promotion(&db, owner, "Pending deal");
        let rejected = promotion(&db, owner, "Rejected deal");
        let reject = Decision::reject("dead link").unwrap();
        db.decide(ListingRef::promotion(rejected), moderator, &reject, None)
            .unwrap();

        assert!(db.record_promotion_click(pending).unwrap().is_none());
        assert!(db.record_promotion_click(rejected).unwrap().is_none());
        assert_eq!(db.get_promotion(pending).unwrap().unwrap().clicks_count, 0);
        assert_eq!(db.get_promotion(rejected).unwrap().unwrap().clicks_count, 0);
    }

    #[test]
    fn nullable_columns_can_be_cleared() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let id = promotion(&db, owner, "Cheap TV");

        let outcome = db
            .update_promotion(
                id,
                &PromotionChanges {
                    description: Some(None),
                    original_price: Some(None),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let EditOutcome::Saved(row) = outcome else {
            panic!("expected the edit to be saved");
        };
        assert_eq!(row.description, None);
        assert_eq!(row.original_price, None);
        // Untouched fields keep their value
        assert_eq!(row.price, 75.0);
        assert_eq!(row.title, "Cheap TV");
    }

    #[test]
    fn edit_and_decision_commit_together() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let moderator = user(&db, "mod", Role::Moderator);
        let id = promotion(&db, owner, "Cheap TV");
        let approve = Decision::Approve;

        let outcome = db
            .update_promotion(
                id,
                &PromotionChanges {
                    title: Some("Cheap 4K TV".into()),
                    is_featured: Some(true),
                    ..Default::default()
                },
                Some(Verdict {
                    moderator_id: moderator,
                    decision: &approve,
                }),
            )
            .unwrap();
        let EditOutcome::Saved(row) = outcome else {
            panic!("expected the edit to be saved");
        };
        assert_eq!(row.status, ModerationStatus::Approved);
        assert_eq!(row.moderator_id, Some(moderator));
        assert_eq!(row.title, "Cheap 4K TV");
        assert!(row.is_featured);

        // A refused decision rolls the content edit back too
        let reject = Decision::reject("too late").unwrap();
        let outcome = db
            .update_promotion(
                id,
                &PromotionChanges {
                    title: Some("Renamed".into()),
                    ..Default::default()
                },
                Some(Verdict {
                    moderator_id: moderator,
                    decision: &reject,
                }),
            )
            .unwrap();
        assert!(matches!(
            outcome,
            EditOutcome::Refused(TransitionError::AlreadyDecided(ModerationStatus::Approved))
        ));
        assert_eq!(db.get_promotion(id).unwrap().unwrap().title, "Cheap 4K TV");

        assert!(matches!(
            db.update_promotion(Uuid::new_v4(), &PromotionChanges::default(), None)
                .unwrap(),
            EditOutcome::NotFound
        ));
    }
}
