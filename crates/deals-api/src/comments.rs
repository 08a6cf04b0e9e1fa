use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use deals_db::models::CommentRow;
use deals_db::queries::NewComment;
use deals_types::access::Capability;
use deals_types::api::{CommentResponse, CreateCommentRequest, UpdateCommentRequest};
use deals_types::models::{ListingKind, ListingRef, TargetKind};
use deals_types::validate;

use crate::Paging;
use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::moderation;

pub(crate) fn comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id,
        content: row.content,
        author_id: row.author_id,
        author_username: row.author_username,
        promotion_id: row.promotion_id,
        coupon_id: row.coupon_id,
        parent_id: row.parent_id,
        is_active: row.is_active,
        is_edited: row.is_edited,
        likes_count: row.likes_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub promotion_id: Option<Uuid>,
    pub coupon_id: Option<Uuid>,
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

/// A comment belongs to exactly one promotion or coupon.
fn listing_of(promotion_id: Option<Uuid>, coupon_id: Option<Uuid>) -> Result<ListingRef, ApiError> {
    match (promotion_id, coupon_id) {
        (Some(id), None) => Ok(ListingRef::promotion(id)),
        (None, Some(id)) => Ok(ListingRef::coupon(id)),
        _ => Err(ApiError::invalid(
            "target",
            "exactly one of promotion_id or coupon_id is required",
        )),
    }
}

fn on_listing(row: &CommentRow, target: ListingRef) -> bool {
    match target.kind {
        ListingKind::Promotion => row.promotion_id == Some(target.id),
        ListingKind::Coupon => row.coupon_id == Some(target.id),
    }
}

fn load_active(state: &AppState, id: Uuid) -> Result<CommentRow, ApiError> {
    state
        .db
        .get_comment(id)?
        .filter(|c| c.is_active)
        .ok_or(ApiError::NotFound("comment not found"))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let target = listing_of(query.promotion_id, query.coupon_id)?;
    let paging = Paging {
        skip: query.skip,
        limit: query.limit,
    };

    let rows = state
        .db
        .list_comments_for(target, paging.offset(), paging.limit())?;
    Ok(Json(rows.into_iter().map(comment_response).collect::<Vec<_>>()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::comment(&req.content)?;
    let target = listing_of(req.promotion_id, req.coupon_id)?;

    if !state
        .db
        .like_target_exists(TargetKind::from(target.kind), target.id)?
    {
        return Err(moderation::not_found(target.kind));
    }

    if let Some(parent_id) = req.parent_id {
        let parent = state
            .db
            .get_comment(parent_id)?
            .filter(|c| c.is_active)
            .ok_or(ApiError::NotFound("parent comment not found"))?;
        if !on_listing(&parent, target) {
            return Err(ApiError::invalid(
                "parent_id",
                "a reply must be on the same listing as its parent",
            ));
        }
    }

    let row = state.db.insert_comment(&NewComment {
        id: Uuid::new_v4(),
        content: req.content.trim().to_string(),
        author_id: me.id,
        target,
        parent_id: req.parent_id,
    })?;

    info!("Comment {} posted by {}", row.id, me.username);
    Ok((StatusCode::CREATED, Json(comment_response(row))))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_active(&state, id)?;
    me.require_owner_or(row.author_id, Capability::EditAnyContent)?;
    validate::comment(&req.content)?;

    let updated = state
        .db
        .update_comment_content(id, req.content.trim())?
        .ok_or(ApiError::NotFound("comment not found"))?;
    Ok(Json(comment_response(updated)))
}

/// Soft delete: the comment disappears from listings but stays on record.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_active(&state, id)?;
    me.require_owner_or(row.author_id, Capability::DeleteAnyContent)?;

    state.db.deactivate_comment(id)?;
    info!("Comment {} removed by {}", id, me.username);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn list_by_author(
    state: &AppState,
    author_id: Uuid,
    paging: Paging,
) -> Result<Vec<CommentResponse>, ApiError> {
    let rows = state
        .db
        .list_comments_by_author(author_id, paging.offset(), paging.limit())?;
    Ok(rows.into_iter().map(comment_response).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_target_must_be_exactly_one_listing() {
        let id = Uuid::new_v4();
        assert_eq!(listing_of(Some(id), None).unwrap(), ListingRef::promotion(id));
        assert_eq!(listing_of(None, Some(id)).unwrap(), ListingRef::coupon(id));
        assert!(listing_of(None, None).is_err());
        assert!(listing_of(Some(id), Some(id)).is_err());
    }
}
