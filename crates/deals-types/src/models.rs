use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A stored enum column held a value outside its closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// Closed set of account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Moderator => "moderator",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "moderator" => Ok(Self::Moderator),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of moderated content.
///
/// Only `Pending`, `Approved` and `Rejected` are ever stored. `Expired` is
/// derived from `expires_at` when an approved item is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ModerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Status as shown to clients: approved items past their expiry read as expired.
    pub fn effective(self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match (self, expires_at) {
            (Self::Approved, Some(at)) if at <= now => Self::Expired,
            (status, _) => status,
        }
    }
}

impl FromStr for ModerationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Fashion,
    Home,
    Books,
    Games,
    Food,
    #[default]
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Electronics => "electronics",
            Self::Fashion => "fashion",
            Self::Home => "home",
            Self::Books => "books",
            Self::Games => "games",
            Self::Food => "food",
            Self::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electronics" => Ok(Self::Electronics),
            "fashion" => Ok(Self::Fashion),
            "home" => Ok(Self::Home),
            "books" => Ok(Self::Books),
            "games" => Ok(Self::Games),
            "food" => Ok(Self::Food),
            "other" => Ok(Self::Other),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// The two kinds of moderated submissions. They share the moderation columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Promotion,
    Coupon,
}

impl ListingKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Promotion => "promotions",
            Self::Coupon => "coupons",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Promotion => "promotion",
            Self::Coupon => "coupon",
        }
    }
}

/// A specific promotion or coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListingRef {
    pub kind: ListingKind,
    pub id: Uuid,
}

impl ListingRef {
    pub fn promotion(id: Uuid) -> Self {
        Self {
            kind: ListingKind::Promotion,
            id,
        }
    }

    pub fn coupon(id: Uuid) -> Self {
        Self {
            kind: ListingKind::Coupon,
            id,
        }
    }
}

/// What a like points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Promotion,
    Coupon,
    Comment,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Promotion => "promotion",
            Self::Coupon => "coupon",
            Self::Comment => "comment",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Promotion => "promotions",
            Self::Coupon => "coupons",
            Self::Comment => "comments",
        }
    }

    /// Column of the `likes` table that references this kind of target.
    pub fn like_column(self) -> &'static str {
        match self {
            Self::Promotion => "promotion_id",
            Self::Coupon => "coupon_id",
            Self::Comment => "comment_id",
        }
    }
}

impl From<ListingKind> for TargetKind {
    fn from(kind: ListingKind) -> Self {
        match kind {
            ListingKind::Promotion => Self::Promotion,
            ListingKind::Coupon => Self::Coupon,
        }
    }
}

impl FromStr for TargetKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "promotion" => Ok(Self::Promotion),
            "coupon" => Ok(Self::Coupon),
            "comment" => Ok(Self::Comment),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}
