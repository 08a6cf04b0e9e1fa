use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use uuid::Uuid;

use deals_db::is_unique_violation;
use deals_types::api::{
    LikeCheckResponse, LikeCountResponse, LikeResponse, LikeState, LikeTarget, ToggleLikeResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Query};
use crate::middleware::CurrentUser;

fn ensure_target(state: &AppState, target: LikeTarget) -> Result<(), ApiError> {
    if state
        .db
        .like_target_exists(target.target_kind, target.target_id)?
    {
        Ok(())
    } else {
        Err(ApiError::NotFound("like target not found"))
    }
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(target): Json<LikeTarget>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_target(&state, target)?;

    let outcome =
        state
            .db
            .toggle_like(Uuid::new_v4(), me.id, target.target_kind, target.target_id)?;

    Ok(Json(ToggleLikeResponse {
        status: if outcome.liked {
            LikeState::Liked
        } else {
            LikeState::Unliked
        },
        likes_count: outcome.count,
    }))
}

/// Strict like: liking twice is a conflict.
pub async fn like(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(target): Json<LikeTarget>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_target(&state, target)?;

    let row = state
        .db
        .insert_like(Uuid::new_v4(), me.id, target.target_kind, target.target_id)
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict(format!("{} already liked", target.target_kind.as_str()))
            } else {
                e.into()
            }
        })?;

    Ok((
        StatusCode::CREATED,
        Json(LikeResponse {
            id: row.id,
            user_id: row.user_id,
            target_kind: row.target_kind,
            target_id: row.target_id,
            created_at: row.created_at,
        }),
    ))
}

pub async fn unlike(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(target): Query<LikeTarget>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .db
        .delete_like(me.id, target.target_kind, target.target_id)?
    {
        return Err(ApiError::NotFound("like not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn count_likes(
    State(state): State<AppState>,
    Query(target): Query<LikeTarget>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_target(&state, target)?;

    let count = state
        .db
        .count_likes(target.target_kind, target.target_id)?;
    Ok(Json(LikeCountResponse { count }))
}

pub async fn check_like(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(target): Query<LikeTarget>,
) -> Result<impl IntoResponse, ApiError> {
    let liked = state
        .db
        .has_liked(me.id, target.target_kind, target.target_id)?;
    Ok(Json(LikeCheckResponse { liked }))
}
