use anyhow::Result;
use chrono::{DateTime, Utc};
use deals_types::models::ListingRef;
use rusqlite::{Connection, Row, TransactionBehavior, params_from_iter};
use uuid::Uuid;

use super::moderation::apply_decision;
use super::{DecideOutcome, EditOutcome, ListingFilter, OptionalExt, Verdict};
use crate::models::{CouponRow, enum_at, opt_ts_at, opt_uuid_at, ts_at, uuid_at};
use crate::{Database, now, timestamp};

pub struct NewCoupon {
    pub id: Uuid,
    pub title: String,
    pub code: String,
    pub description: Option<String>,
    pub link: String,
    pub store: String,
    pub discount_value: String,
    pub min_purchase: Option<String>,
    pub owner_id: Uuid,
    pub expires_at: Option<DateTime<Utc>>,
}

/// `None` keeps the stored value; `Some(None)` clears a nullable column.
#[derive(Debug, Default)]
pub struct CouponChanges {
    pub title: Option<String>,
    pub code: Option<String>,
    pub description: Option<Option<String>>,
    pub link: Option<String>,
    pub store: Option<String>,
    pub discount_value: Option<String>,
    pub min_purchase: Option<Option<String>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub moderation_notes: Option<String>,
    pub is_active: Option<bool>,
}

const COUPON_SELECT: &str = "
    SELECT t.id, t.title, t.code, t.description, t.link, t.store, t.discount_value, t.min_purchase,
           t.owner_id, u.username, t.moderator_id, t.status, t.rejection_reason, t.moderation_notes,
           t.is_active, t.times_used,
           (SELECT COUNT(*) FROM likes l WHERE l.coupon_id = t.id),
           t.expires_at, t.created_at, t.updated_at, t.decided_at
    FROM coupons t
    JOIN users u ON u.id = t.owner_id";

impl Database {
    // -- Coupons --

    /// Codes are stored upper-case.
    pub fn insert_coupon(&self, new: &NewCoupon) -> Result<CouponRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO coupons
                    (id, title, code, description, link, store, discount_value, min_purchase,
                     owner_id, expires_at, created_at)
                 VALUES (?1, ?2, UPPER(?3), ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    new.id.to_string(),
                    new.title,
                    new.code,
                    new.description,
                    new.link,
                    new.store,
                    new.discount_value,
                    new.min_purchase,
                    new.owner_id.to_string(),
                    new.expires_at.map(timestamp),
                    now(),
                ],
            )?;
            query_coupon(conn, new.id)?
                .ok_or_else(|| anyhow::anyhow!("coupon {} vanished after insert", new.id))
        })
    }

    pub fn get_coupon(&self, id: Uuid) -> Result<Option<CouponRow>> {
        self.with_conn(|conn| query_coupon(conn, id))
    }

    pub fn list_coupons(&self, filter: &ListingFilter) -> Result<Vec<CouponRow>> {
        let (tail, params) = filter.to_sql(&["title", "description", "store", "code"], false);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{COUPON_SELECT}{tail}"))?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), map_coupon)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Same contract as [`Database::update_promotion`].
    pub fn update_coupon(
        &self,
        id: Uuid,
        changes: &CouponChanges,
        verdict: Option<Verdict<'_>>,
    ) -> Result<EditOutcome<CouponRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(verdict) = verdict {
                match apply_decision(
                    &tx,
                    ListingRef::coupon(id),
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
                "UPDATE coupons SET
                    title = COALESCE(?1, title),
                    code = COALESCE(UPPER(?2), code),
                    description = CASE WHEN ?3 THEN ?4 ELSE description END,
                    link = COALESCE(?5, link),
                    store = COALESCE(?6, store),
                    discount_value = COALESCE(?7, discount_value),
                    min_purchase = CASE WHEN ?8 THEN ?9 ELSE min_purchase END,
                    expires_at = CASE WHEN ?10 THEN ?11 ELSE expires_at END,
                    moderation_notes = COALESCE(?12, moderation_notes),
                    is_active = COALESCE(?13, is_active),
                    updated_at = ?14
                 WHERE id = ?15",
                rusqlite::params![
                    changes.title,
                    changes.code,
                    changes.description.is_some(),
                    changes.description.clone().flatten(),
                    changes.link,
                    changes.store,
                    changes.discount_value,
                    changes.min_purchase.is_some(),
                    changes.min_purchase.clone().flatten(),
                    changes.expires_at.is_some(),
                    changes.expires_at.flatten().map(timestamp),
                    changes.moderation_notes,
                    changes.is_active,
                    now(),
                    id.to_string(),
                ],
            )?;
            if updated == 0 {
                return Ok(EditOutcome::NotFound);
            }

            let row = query_coupon(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("coupon {id} vanished during update"))?;
            tx.commit()?;
            Ok(EditOutcome::Saved(row))
        })
    }

    pub fn delete_coupon(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM coupons WHERE id = ?1", [id.to_string()])?;
            Ok(deleted > 0)
        })
    }

    /// Bumps `times_used` of a published coupon and returns
    /// `(code, times_used)`. Pending, rejected and hidden coupons are `None`.
    pub fn record_coupon_use(&self, id: Uuid) -> Result<Option<(String, i64)>> {
        self.with_conn(|conn| {
            conn.query_row(
                "UPDATE coupons SET times_used = times_used + 1
                 WHERE id = ?1 AND status = 'approved' AND is_active = 1
                 RETURNING code, times_used",
                [id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
    }
}

fn map_coupon(row: &Row<'_>) -> rusqlite::Result<CouponRow> {
    Ok(CouponRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        code: row.get(2)?,
        description: row.get(3)?,
        link: row.get(4)?,
        store: row.get(5)?,
        discount_value: row.get(6)?,
        min_purchase: row.get(7)?,
        owner_id: uuid_at(row, 8)?,
        owner_username: row.get(9)?,
        moderator_id: opt_uuid_at(row, 10)?,
        status: enum_at(row, 11)?,
        rejection_reason: row.get(12)?,
        moderation_notes: row.get(13)?,
        is_active: row.get(14)?,
        times_used: row.get(15)?,
        likes_count: row.get(16)?,
        expires_at: opt_ts_at(row, 17)?,
        created_at: ts_at(row, 18)?,
        updated_at: opt_ts_at(row, 19)?,
        decided_at: opt_ts_at(row, 20)?,
    })
}

pub(super) fn query_coupon(conn: &Connection, id: Uuid) -> Result<Option<CouponRow>> {
    let mut stmt = conn.prepare_cached(&format!("{COUPON_SELECT} WHERE t.id = ?1"))?;
    stmt.query_row([id.to_string()], map_coupon).optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{coupon, db, page, user};
    use deals_types::models::{ModerationStatus, Role};
    use deals_types::moderation::Decision;

    #[test]
    fn codes_are_upper_cased() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let id = coupon(&db, owner, "save10");

        let row = db.get_coupon(id).unwrap().unwrap();
        assert_eq!(row.code, "SAVE10");
        assert_eq!(row.status, ModerationStatus::Pending);

        let outcome = db
            .update_coupon(
                id,
                &CouponChanges {
                    code: Some("save20".into()),
                    min_purchase: Some(Some("$50".into())),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let EditOutcome::Saved(row) = outcome else {
            panic!("expected the edit to be saved");
        };
        assert_eq!(row.code, "SAVE20");
        assert_eq!(row.discount_value, "10%");
        assert_eq!(row.min_purchase.as_deref(), Some("$50"));

        let outcome = db
            .update_coupon(
                id,
                &CouponChanges {
                    min_purchase: Some(None),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let EditOutcome::Saved(row) = outcome else {
            panic!("expected the edit to be saved");
        };
        assert_eq!(row.min_purchase, None);
        assert_eq!(row.code, "SAVE20");
    }

    #[test]
    fn search_covers_the_code() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        coupon(&db, owner, "WELCOME");
        coupon(&db, owner, "SUMMER");

        let rows = db
            .list_coupons(&ListingFilter {
                search: Some("summer".into()),
                ..page()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, "SUMMER");
    }

    #[test]
    fn uses_are_counted() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let moderator = user(&db, "mod", Role::Moderator);
        let id = coupon(&db, owner, "save10");

        // Not redeemable until approved
        assert!(db.record_coupon_use(id).unwrap().is_none());
        db.decide(ListingRef::coupon(id), moderator, &Decision::Approve, None)
            .unwrap();

        db.record_coupon_use(id).unwrap();
        let (code, used) = db.record_coupon_use(id).unwrap().unwrap();
        assert_eq!(code, "SAVE10");
        assert_eq!(used, 2);
        assert!(db.record_coupon_use(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn rejected_coupons_are_not_redeemable() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let moderator = user(&db, "mod", Role::Moderator);
        let id = coupon(&db, owner, "secret50");
        let reject = Decision::reject("leaked staff code").unwrap();
        db.decide(ListingRef::coupon(id), moderator, &reject, None)
            .unwrap();

        assert!(db.record_coupon_use(id).unwrap().is_none());
        assert_eq!(db.get_coupon(id).unwrap().unwrap().times_used, 0);
    }

    #[test]
    fn status_update_and_edit_share_a_transaction() {
        let db = db();
        let owner = user(&db, "alice", Role::User);
        let moderator = user(&db, "mod", Role::Moderator);
        let id = coupon(&db, owner, "save10");
        let reject = Decision::reject("expired at the store").unwrap();

        let outcome = db
            .update_coupon(
                id,
                &CouponChanges {
                    moderation_notes: Some("checked on 2026-10-01".into()),
                    is_active: Some(false),
                    ..Default::default()
                },
                Some(Verdict {
                    moderator_id: moderator,
                    decision: &reject,
                }),
            )
            .unwrap();
        let EditOutcome::Saved(row) = outcome else {
            panic!("expected the edit to be saved");
        };
        assert_eq!(row.status, ModerationStatus::Rejected);
        assert_eq!(row.rejection_reason.as_deref(), Some("expired at the store"));
        assert_eq!(row.moderation_notes.as_deref(), Some("checked on 2026-10-01"));
        assert!(!row.is_active);
    }
}
