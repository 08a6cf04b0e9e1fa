use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Category, ModerationStatus, Role, TargetKind};

// -- JWT Claims --

/// Access-token claims. The role is a snapshot taken at issue time; the
/// server re-reads the account on every request before trusting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: UserResponse,
}

// -- Users --

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// What anyone may see about an account.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUserResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRoleRequest {
    pub role: Role,
}

// -- Promotions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePromotionRequest {
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub original_price: Option<f64>,
    pub price: f64,
    pub store: String,
    #[serde(default)]
    pub category: Category,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update. `status`, `rejection_reason`, `moderation_notes`,
/// `is_featured` and `is_active` are staff-only. An explicit `null` clears
/// `description`, `original_price` or `expires_at`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePromotionRequest {
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    pub link: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub original_price: Option<Option<f64>>,
    pub price: Option<f64>,
    pub store: Option<String>,
    pub category: Option<Category>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<ModerationStatus>,
    pub rejection_reason: Option<String>,
    pub moderation_notes: Option<String>,
    pub is_featured: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub link: String,
    pub original_price: Option<f64>,
    pub price: f64,
    pub discount_percentage: Option<f64>,
    pub category: Category,
    pub store: String,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub moderator_id: Option<Uuid>,
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

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    pub link: String,
    pub clicks_count: i64,
}

// -- Coupons --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCouponRequest {
    pub title: String,
    pub code: String,
    pub description: Option<String>,
    pub link: String,
    pub store: String,
    pub discount_value: String,
    pub min_purchase: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update. An explicit `null` clears `description`, `min_purchase`
/// or `expires_at`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCouponRequest {
    pub title: Option<String>,
    pub code: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    pub link: Option<String>,
    pub store: Option<String>,
    pub discount_value: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub min_purchase: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<ModerationStatus>,
    pub rejection_reason: Option<String>,
    pub moderation_notes: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponResponse {
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

#[derive(Debug, Serialize)]
pub struct UseCouponResponse {
    pub code: String,
    pub times_used: i64,
}

// -- Moderation --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectRequest {
    pub reason: String,
    pub moderation_notes: Option<String>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
    pub promotion_id: Option<Uuid>,
    pub coupon_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
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

// -- Likes --

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LikeTarget {
    pub target_kind: TargetKind,
    pub target_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeState {
    Liked,
    Unliked,
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub status: LikeState,
    pub likes_count: i64,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_kind: TargetKind,
    pub target_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LikeCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct LikeCheckResponse {
    pub liked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_null_fields_are_distinct() {
        let absent: UpdatePromotionRequest = serde_json::from_str(r#"{"title": "New"}"#).unwrap();
        assert_eq!(absent.description, None);
        assert_eq!(absent.title.as_deref(), Some("New"));

        let cleared: UpdatePromotionRequest =
            serde_json::from_str(r#"{"description": null, "original_price": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert_eq!(cleared.original_price, Some(None));

        let set: UpdateCouponRequest = serde_json::from_str(r#"{"min_purchase": "$20"}"#).unwrap();
        assert_eq!(set.min_purchase, Some(Some("$20".to_string())));
    }
}
