use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use deals_db::models::CouponRow;
use deals_db::queries::{CouponChanges, ListOrder, ListingFilter, NewCoupon, Verdict};
use deals_types::access::Capability;
use deals_types::api::{
    CouponResponse, CreateCouponRequest, RejectRequest, UpdateCouponRequest, UseCouponResponse,
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

pub(crate) fn coupon_response(row: CouponRow) -> CouponResponse {
    CouponResponse {
        id: row.id,
        status: row.status.effective(row.expires_at, Utc::now()),
        title: row.title,
        code: row.code,
        description: row.description,
        link: row.link,
        store: row.store,
        discount_value: row.discount_value,
        min_purchase: row.min_purchase,
        owner_id: row.owner_id,
        owner_username: row.owner_username,
        moderator_id: row.moderator_id,
        rejection_reason: row.rejection_reason,
        moderation_notes: row.moderation_notes,
        is_active: row.is_active,
        times_used: row.times_used,
        likes_count: row.likes_count,
        expires_at: row.expires_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
        decided_at: row.decided_at,
    }
}

fn load(state: &AppState, id: Uuid) -> Result<CouponRow, ApiError> {
    state
        .db
        .get_coupon(id)?
        .ok_or(ApiError::NotFound("coupon not found"))
}

pub async fn list_coupons(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let paging = query.paging();
    let rows = state.db.list_coupons(&ListingFilter {
        status: Some(ModerationStatus::Approved),
        live_at: Some(Utc::now()),
        search: query.q,
        store: query.store,
        offset: paging.offset(),
        limit: paging.limit(),
        ..Default::default()
    })?;
    Ok(Json(rows.into_iter().map(coupon_response).collect::<Vec<_>>()))
}

pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load(&state, id)?;
    if row.status != ModerationStatus::Approved || !row.is_active {
        return Err(ApiError::NotFound("coupon not found"));
    }
    Ok(Json(coupon_response(row)))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<CreateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate::title(&req.title)?;
    validate::coupon_code(&req.code)?;
    validate::description(req.description.as_deref())?;
    validate::link(&req.link)?;
    validate::store(&req.store)?;
    validate::discount_value(&req.discount_value)?;
    validate::min_purchase(req.min_purchase.as_deref())?;

    let row = state.db.insert_coupon(&NewCoupon {
        id: Uuid::new_v4(),
        title: req.title.trim().to_string(),
        code: req.code.trim().to_string(),
        description: req.description,
        link: req.link.trim().to_string(),
        store: req.store.trim().to_string(),
        discount_value: req.discount_value.trim().to_string(),
        min_purchase: req.min_purchase,
        owner_id: me.id,
        expires_at: req.expires_at,
    })?;

    info!("Coupon {} ({}) submitted by {}", row.id, row.code, me.username);
    Ok((StatusCode::CREATED, Json(coupon_response(row))))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<UpdateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load(&state, id)?;
    me.require_owner_or(row.owner_id, Capability::EditAnyContent)?;

    if req.status.is_some()
        || req.rejection_reason.is_some()
        || req.moderation_notes.is_some()
        || req.is_active.is_some()
    {
        me.require(Capability::Moderate)?;
    }

    if !me.role.can(Capability::EditAnyContent)
        && state.config.lock_decided_content
        && row.status.is_decided()
    {
        return Err(ApiError::Conflict(format!(
            "this coupon has already been {} and can no longer be edited",
            row.status
        )));
    }

    if let Some(title) = &req.title {
        validate::title(title)?;
    }
    if let Some(code) = &req.code {
        validate::coupon_code(code)?;
    }
    validate::description(req.description.as_ref().and_then(|d| d.as_deref()))?;
    if let Some(link) = &req.link {
        validate::link(link)?;
    }
    if let Some(store) = &req.store {
        validate::store(store)?;
    }
    if let Some(value) = &req.discount_value {
        validate::discount_value(value)?;
    }
    validate::min_purchase(req.min_purchase.as_ref().and_then(|m| m.as_deref()))?;
    validate::optional_length("moderation_notes", req.moderation_notes.as_deref(), 2000)?;

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

    let changes = CouponChanges {
        title: req.title.map(|t| t.trim().to_string()),
        code: req.code.map(|c| c.trim().to_string()),
        description: req.description,
        link: req.link.map(|l| l.trim().to_string()),
        store: req.store.map(|s| s.trim().to_string()),
        discount_value: req.discount_value.map(|v| v.trim().to_string()),
        min_purchase: req.min_purchase,
        expires_at: req.expires_at,
        moderation_notes: req.moderation_notes,
        is_active: req.is_active,
    };
    let verdict = decision.as_ref().map(|decision| Verdict {
        moderator_id: me.id,
        decision,
    });

    let outcome = state.db.update_coupon(id, &changes, verdict)?;
    let updated = moderation::saved(outcome, ListingKind::Coupon)?;

    Ok(Json(coupon_response(updated)))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load(&state, id)?;
    me.require_owner_or(row.owner_id, Capability::DeleteAnyContent)?;

    if !state.db.delete_coupon(id)? {
        return Err(ApiError::NotFound("coupon not found"));
    }
    info!("Coupon {} deleted by {}", id, me.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Counts a redemption and hands back the code.
pub async fn use_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (code, times_used) = state
        .db
        .record_coupon_use(id)?
        .ok_or(ApiError::NotFound("coupon not found"))?;
    Ok(Json(UseCouponResponse { code, times_used }))
}

pub async fn pending_coupons(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Capability::Moderate)?;

    let rows = state.db.list_coupons(&ListingFilter {
        status: Some(ModerationStatus::Pending),
        order: ListOrder::Oldest,
        offset: paging.offset(),
        limit: paging.limit(),
        ..Default::default()
    })?;
    Ok(Json(rows.into_iter().map(coupon_response).collect::<Vec<_>>()))
}

pub async fn approve_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    moderation::approve(&state, &me, ListingRef::coupon(id))?;
    Ok(Json(coupon_response(load(&state, id)?)))
}

pub async fn reject_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<RejectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    moderation::reject(&state, &me, ListingRef::coupon(id), &req)?;
    Ok(Json(coupon_response(load(&state, id)?)))
}

pub(crate) fn list_by_owner(
    state: &AppState,
    owner_id: Uuid,
    paging: Paging,
) -> Result<Vec<CouponResponse>, ApiError> {
    let rows = state.db.list_coupons(&ListingFilter {
        owner_id: Some(owner_id),
        offset: paging.offset(),
        limit: paging.limit(),
        ..Default::default()
    })?;
    Ok(rows.into_iter().map(coupon_response).collect())
}
