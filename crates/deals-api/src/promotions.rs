use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use deals_db::models::PromotionRow;
use deals_db::queries::{ListOrder, ListingFilter, NewPromotion, PromotionChanges, Verdict};
use deals_types::access::Capability;
use deals_types::api::{
    ClickResponse, CreatePromotionRequest, PromotionResponse, RejectRequest,
    UpdatePromotionRequest,
};
use deals_types::models::{ListingKind, ListingRef, ModerationStatus};
use deals_types::moderation::Decision;
use deals_types::validate;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::moderation;
use crate::{ListingQuery, Paging};

pub(crate) fn promotion_response(row: PromotionRow) -> PromotionResponse {
    PromotionResponse {
        id: row.id,
        discount_percentage: validate::discount_percentage(row.price, row.original_price),
        status: row.status.effective(row.expires_at, Utc::now()),
        title: row.title,
        description: row.description,
        link: row.link,
        original_price: row.original_price,
        price: row.price,
        category: row.category,
        store: row.store,
        owner_id: row.owner_id,
        owner_username: row.owner_username,
        moderator_id: row.moderator_id,
        rejection_reason: row.rejection_reason,
        moderation_notes: row.moderation_notes,
        is_active: row.is_active,
        is_featured: row.is_featured,
        views_count: row.views_count,
        clicks_count: row.clicks_count,
        likes_count: row.likes_count,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
        decided_at: row.decided_at,
    }
}

fn responses(rows: Vec<PromotionRow>) -> Json<Vec<PromotionResponse>> {
    Json(rows.into_iter().map(promotion_response).collect())
}

fn load(state: &AppState, id: Uuid) -> Result<PromotionRow, ApiError> {
    state
        .db
        .get_promotion(id)?
        .ok_or(ApiError::NotFound("promotion not found"))
}

/// Approved, active, unexpired promotions. Featured ones first.
pub async fn list_promotions(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = query.paging();
    let rows = state.db.list_promotions(&ListingFilter {
        status: Some(ModerationStatus::Approved),
        live_at: Some(Utc::now()),
        search: query.q,
        category: query.category,
        store: query.store,
        offset: paging.offset(),
        limit: paging.limit(),
        ..Default::default()
    })?;
    Ok(responses(rows))
}

pub async fn get_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut row = load(&state, id)?;
    if row.status != ModerationStatus::Approved || !row.is_active {
        return Err(ApiError::NotFound("promotion not found"));
    }

    if state.db.record_promotion_view(id)? {
        row.views_count += 1;
    }
    Ok(Json(promotion_response(row)))
}

pub async fn create_promotion(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<CreatePromotionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::title(&req.title)?;
    validate::description(req.description.as_deref())?;
    validate::link(&req.link)?;
    validate::store(&req.store)?;
    validate::prices(req.price, req.original_price)?;

    let row = state.db.insert_promotion(&NewPromotion {
        id: Uuid::new_v4(),
        title: req.title.trim().to_string(),
        description: req.description,
        link: req.link.trim().to_string(),
        original_price: req.original_price,
        price: req.price,
        category: req.category,
        store: req.store.trim().to_string(),
        owner_id: me.id,
        expires_at: req.expires_at,
    })?;

    info!("Promotion {} submitted by {}", row.id, me.username);
    Ok((StatusCode::CREATED, Json(promotion_response(row))))
}

/// Owners edit content; staff may edit anything, and a `status` change is
/// applied as a moderation decision.
pub async fn update_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<UpdatePromotionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load(&state, id)?;
    me.require_owner_or(row.owner_id, Capability::EditAnyContent)?;

    let touches_moderation = req.status.is_some()
        || req.rejection_reason.is_some()
        || req.moderation_notes.is_some()
        || req.is_featured.is_some()
        || req.is_active.is_some();
    if touches_moderation {
        me.require(Capability::Moderate)?;
    }

    let staff = me.role.can(Capability::EditAnyContent);
    if !staff && state.config.lock_decided_content && row.status.is_decided() {
        return Err(ApiError::Conflict(format!(
            "this promotion has already been {} and can no longer be edited",
            row.status
        )));
    }

    if let Some(title) = &req.title {
        validate::title(title)?;
    }
    validate::description(req.description.as_ref().and_then(|d| d.as_deref()))?;
    if let Some(link) = &req.link {
        validate::link(link)?;
    }
    if let Some(store) = &req.store {
        validate::store(store)?;
    }
    validate::optional_length("moderation_notes", req.moderation_notes.as_deref(), 2000)?;
    validate::prices(
        req.price.unwrap_or(row.price),
        req.original_price.unwrap_or(row.original_price),
    )?;

    let decision = match req.status {
        Some(status) => Some(Decision::for_status(status, req.rejection_reason.as_deref())?),
        None if req.rejection_reason.is_some() => {
            return Err(ApiError::invalid(
                "rejection_reason",
                "only allowed together with status \"rejected\"",
            ));
        }
        None => None,
    };

    let changes = PromotionChanges {
        title: req.title.map(|t| t.trim().to_string()),
        description: req.description,
        link: req.link.map(|l| l.trim().to_string()),
        original_price: req.original_price,
        price: req.price,
        category: req.category,
        store: req.store.map(|s| s.trim().to_string()),
        expires_at: req.expires_at,
        moderation_notes: req.moderation_notes,
        is_featured: req.is_featured,
        is_active: req.is_active,
    };
    let verdict = decision.as_ref().map(|decision| Verdict {
        moderator_id: me.id,
        decision,
    });

    let outcome = state.db.update_promotion(id, &changes, verdict)?;
    let updated = moderation::saved(outcome, ListingKind::Promotion)?;

    Ok(Json(promotion_response(updated)))
}

pub async fn delete_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load(&state, id)?;
    me.require_owner_or(row.owner_id, Capability::DeleteAnyContent)?;

    if !state.db.delete_promotion(id)? {
        return Err(ApiError::NotFound("promotion not found"));
    }
    info!("Promotion {} deleted by {}", id, me.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn click_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (link, clicks_count) = state
        .db
        .record_promotion_click(id)?
        .ok_or(ApiError::NotFound("promotion not found"))?;
    Ok(Json(ClickResponse { link, clicks_count }))
}

/// Moderation queue, oldest submission first.
pub async fn pending_promotions(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Capability::Moderate)?;

    let rows = state.db.list_promotions(&ListingFilter {
        status: Some(ModerationStatus::Pending),
        order: ListOrder::Oldest,
        offset: paging.offset(),
        limit: paging.limit(),
        ..Default::default()
    })?;
    Ok(responses(rows))
}

pub async fn approve_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    moderation::approve(&state, &me, ListingRef::promotion(id))?;
    Ok(Json(promotion_response(load(&state, id)?)))
}

pub async fn reject_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<RejectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    moderation::reject(&state, &me, ListingRef::promotion(id), &req)?;
    Ok(Json(promotion_response(load(&state, id)?)))
}

/// Everything a user submitted, in any status.
pub(crate) fn list_by_owner(
    state: &AppState,
    owner_id: Uuid,
    paging: Paging,
) -> Result<Vec<PromotionResponse>, ApiError> {
    let rows = state.db.list_promotions(&ListingFilter {
        owner_id: Some(owner_id),
        offset: paging.offset(),
        limit: paging.limit(),
        ..Default::default()
    })?;
    Ok(rows.into_iter().map(promotion_response).collect())
}
