mod comments;
mod coupons;
mod likes;
mod moderation;
mod promotions;
mod tokens;
mod users;

pub use comments::NewComment;
pub use coupons::{CouponChanges, NewCoupon};
pub use likes::ToggleOutcome;
pub use moderation::{DecideOutcome, EditOutcome, Verdict};
pub use promotions::{NewPromotion, PromotionChanges};
pub use users::{NewUser, UserChanges};

use anyhow::Result;
use chrono::{DateTime, Utc};
use deals_types::models::{Category, ModerationStatus};
use rusqlite::types::Value;
use uuid::Uuid;

use crate::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    /// Featured first, then most recent. Used for public browsing.
    #[default]
    Newest,
    /// First in, first out. Used for the moderation queues.
    Oldest,
}

/// Selection shared by promotion and coupon listings.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub status: Option<ModerationStatus>,
    /// Only `is_active` rows that have not expired at this instant.
    pub live_at: Option<DateTime<Utc>>,
    pub owner_id: Option<Uuid>,
    pub search: Option<String>,
    /// Ignored for coupons.
    pub category: Option<Category>,
    pub store: Option<String>,
    pub order: ListOrder,
    pub offset: u32,
    pub limit: u32,
}

impl ListingFilter {
    /// WHERE/ORDER/LIMIT tail for a listing query over alias `t`.
    /// `searchable` names the text columns matched by `search`.
    fn to_sql(&self, searchable: &[&str], has_category: bool) -> (String, Vec<Value>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(status) = self.status {
            params.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("t.status = ?{}", params.len()));
        }

        if let Some(at) = self.live_at {
            params.push(Value::Text(timestamp(at)));
            clauses.push(format!(
                "t.is_active = 1 AND (t.expires_at IS NULL OR t.expires_at > ?{})",
                params.len()
            ));
        }

        if let Some(owner) = self.owner_id {
            params.push(Value::Text(owner.to_string()));
            clauses.push(format!("t.owner_id = ?{}", params.len()));
        }

        if let Some(q) = self.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            params.push(Value::Text(format!("%{}%", escape_like(q))));
            let n = params.len();
            let any = searchable
                .iter()
                .map(|col| format!("t.{col} LIKE ?{n} ESCAPE '\\'"))
                .collect::<Vec<_>>()
                .join(" OR ");
            clauses.push(format!("({any})"));
        }

        if has_category {
            if let Some(category) = self.category {
                params.push(Value::Text(category.as_str().to_string()));
                clauses.push(format!("t.category = ?{}", params.len()));
            }
        }

        if let Some(store) = self.store.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(Value::Text(store.to_string()));
            clauses.push(format!("t.store = ?{} COLLATE NOCASE", params.len()));
        }

        let mut sql = String::new();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(match (self.order, has_category) {
            (ListOrder::Newest, true) => " ORDER BY t.is_featured DESC, t.created_at DESC",
            (ListOrder::Newest, false) => " ORDER BY t.created_at DESC",
            (ListOrder::Oldest, _) => " ORDER BY t.created_at ASC",
        });

        params.push(Value::Integer(i64::from(self.limit)));
        params.push(Value::Integer(i64::from(self.offset)));
        sql.push_str(&format!(
            " LIMIT ?{} OFFSET ?{}",
            params.len() - 1,
            params.len()
        ));

        (sql, params)
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
