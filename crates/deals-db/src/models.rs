//! Database row types. Distinct from the deals-types API models to keep the
//! DB layer independent of the wire format.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use deals_types::models::{Category, ModerationStatus, Role, TargetKind};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PromotionRow {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub original_price: Option<f64>,
    pub price: f64,
    pub category: Category,
    pub store: String,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub moderator_id: Option<Uuid>,
    /// Stored status: never `Expired`.
    pub status: ModerationStatus,
    pub rejection_reason: Option<String>,
    pub moderation_notes: Option<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub views_count: i64,
    pub clicks_count: i64,
    pub likes_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CouponRow {
    pub id: Uuid,
    pub title: String,
    pub code: String,
    pub description: Option<String>,
    pub link: String,
    pub store: String,
    pub discount_value: String,
    pub min_purchase: Option<String>,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub moderator_id: Option<Uuid>,
    pub status: ModerationStatus,
    pub rejection_reason: Option<String>,
    pub moderation_notes: Option<String>,
    pub is_active: bool,
    pub times_used: i64,
    pub likes_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub promotion_id: Option<Uuid>,
    pub coupon_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub is_edited: bool,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LikeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_kind: TargetKind,
    pub target_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// -- Column decoding --

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| raw.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_ts_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| conversion_error(idx, e))
        })
        .transpose()
}

pub(crate) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}
