use axum::{Extension, extract::State, response::IntoResponse};

use deals_db::queries::{DecideOutcome, EditOutcome};
use deals_types::access::Capability;
use deals_types::api::RejectRequest;
use deals_types::models::{ListingKind, ListingRef};
use deals_types::moderation::Decision;

use crate::Paging;
use crate::auth::{AppState, AppStateInner};
use crate::comments::comment_response;
use crate::error::ApiError;
use crate::extract::{Json, Query};
use crate::middleware::CurrentUser;

pub(crate) fn not_found(kind: ListingKind) -> ApiError {
    match kind {
        ListingKind::Promotion => ApiError::NotFound("promotion not found"),
        ListingKind::Coupon => ApiError::NotFound("coupon not found"),
    }
}

/// Records `moderator`'s decision on a promotion or coupon.
pub(crate) fn decide(
    state: &AppStateInner,
    moderator: &CurrentUser,
    target: ListingRef,
    decision: &Decision,
    notes: Option<&str>,
) -> Result<(), ApiError> {
    moderator.require(Capability::Moderate)?;

    match state.db.decide(target, moderator.id, decision, notes)? {
        DecideOutcome::Decided(_) => Ok(()),
        DecideOutcome::NotFound => Err(not_found(target.kind)),
        DecideOutcome::Refused(refusal) => Err(refusal.into()),
    }
}

/// Unwraps the result of an edit that may have carried a decision.
pub(crate) fn saved<T>(outcome: EditOutcome<T>, kind: ListingKind) -> Result<T, ApiError> {
    match outcome {
        EditOutcome::Saved(row) => Ok(row),
        EditOutcome::NotFound => Err(not_found(kind)),
        EditOutcome::Refused(refusal) => Err(refusal.into()),
    }
}

pub(crate) fn approve(
    state: &AppStateInner,
    moderator: &CurrentUser,
    target: ListingRef,
) -> Result<(), ApiError> {
    decide(state, moderator, target, &Decision::Approve, None)
}

pub(crate) fn reject(
    state: &AppStateInner,
    moderator: &CurrentUser,
    target: ListingRef,
    req: &RejectRequest,
) -> Result<(), ApiError> {
    moderator.require(Capability::Moderate)?;
    deals_types::validate::optional_length(
        "moderation_notes",
        req.moderation_notes.as_deref(),
        2000,
    )?;
    let decision = Decision::reject(&req.reason)?;
    decide(
        state,
        moderator,
        target,
        &decision,
        req.moderation_notes.as_deref(),
    )
}

/// Every comment, soft-deleted ones included.
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Capability::Moderate)?;

    let rows = state.db.list_all_comments(paging.offset(), paging.limit())?;
    Ok(Json(rows.into_iter().map(comment_response).collect::<Vec<_>>()))
}
