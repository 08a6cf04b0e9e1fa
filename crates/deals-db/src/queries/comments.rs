use anyhow::Result;
use deals_types::models::{ListingKind, ListingRef};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::OptionalExt;
use crate::models::{CommentRow, opt_ts_at, opt_uuid_at, ts_at, uuid_at};
use crate::{Database, now};

pub struct NewComment {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub target: ListingRef,
    pub parent_id: Option<Uuid>,
}

const COMMENT_SELECT: &str = "
    SELECT c.id, c.content, c.author_id, u.username, c.promotion_id, c.coupon_id, c.parent_id,
           c.is_active, c.is_edited,
           (SELECT COUNT(*) FROM likes l WHERE l.comment_id = c.id),
           c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.author_id";

impl Database {
    // -- Comments --

    pub fn insert_comment(&self, new: &NewComment) -> Result<CommentRow> {
        let (promotion_id, coupon_id) = match new.target.kind {
            ListingKind::Promotion => (Some(new.target.id.to_string()), None),
            ListingKind::Coupon => (None, Some(new.target.id.to_string())),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, content, author_id, promotion_id, coupon_id, parent_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.id.to_string(),
                    new.content,
                    new.author_id.to_string(),
                    promotion_id,
                    coupon_id,
                    new.parent_id.map(|p| p.to_string()),
                    now(),
                ],
            )?;
            query_comment(conn, new.id)?
                .ok_or_else(|| anyhow::anyhow!("comment {} vanished after insert", new.id))
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    /// Visible comments on a promotion or coupon, oldest first.
    pub fn list_comments_for(
        &self,
        target: ListingRef,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<CommentRow>> {
        let column = match target.kind {
            ListingKind::Promotion => "promotion_id",
            ListingKind::Coupon => "coupon_id",
        };
        self.with_conn(|conn| {
            query_comments(
                conn,
                &format!("WHERE c.{column} = ?1 AND c.is_active = 1 ORDER BY c.created_at ASC LIMIT ?2 OFFSET ?3"),
                rusqlite::params![target.id.to_string(), limit, offset],
            )
        })
    }

    /// Every comment including soft-deleted ones, newest first. Moderation view.
    pub fn list_all_comments(&self, offset: u32, limit: u32) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            query_comments(
                conn,
                "ORDER BY c.created_at DESC LIMIT ?1 OFFSET ?2",
                rusqlite::params![limit, offset],
            )
        })
    }

    pub fn list_comments_by_author(
        &self,
        author_id: Uuid,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            query_comments(
                conn,
                "WHERE c.author_id = ?1 ORDER BY c.created_at DESC LIMIT ?2 OFFSET ?3",
                rusqlite::params![author_id.to_string(), limit, offset],
            )
        })
    }

    pub fn update_comment_content(&self, id: Uuid, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE comments SET content = ?1, is_edited = 1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![content, now(), id.to_string()],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_comment(conn, id)
        })
    }

    /// Soft delete. Returns false when the comment does not exist.
    pub fn deactivate_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE comments SET is_active = 0, updated_at = ?1 WHERE id = ?2",
                rusqlite::params![now(), id.to_string()],
            )?;
            Ok(updated > 0)
        })
    }
}

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: uuid_at(row, 0)?,
        content: row.get(1)?,
        author_id: uuid_at(row, 2)?,
        author_username: row.get(3)?,
        promotion_id: opt_uuid_at(row, 4)?,
        coupon_id: opt_uuid_at(row, 5)?,
        parent_id: opt_uuid_at(row, 6)?,
        is_active: row.get(7)?,
        is_edited: row.get(8)?,
        likes_count: row.get(9)?,
        created_at: ts_at(row, 10)?,
        updated_at: opt_ts_at(row, 11)?,
    })
}

fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<CommentRow>> {
    let mut stmt = conn.prepare_cached(&format!("{COMMENT_SELECT} WHERE c.id = ?1"))?;
    stmt.query_row([id.to_string()], map_comment).optional()
}

fn query_comments<P: rusqlite::Params>(
    conn: &Connection,
    tail: &str,
    params: P,
) -> Result<Vec<CommentRow>> {
    let mut stmt = conn.prepare(&format!("{COMMENT_SELECT} {tail}"))?;
    let rows = stmt
        .query_map(params, map_comment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
