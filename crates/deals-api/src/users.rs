use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};
use uuid::Uuid;

use deals_db::models::UserRow;
use deals_db::queries::UserChanges;
use deals_db::{is_foreign_key_violation, is_unique_violation};
use deals_types::access::Capability;
use deals_types::api::{PublicUserResponse, SetRoleRequest, UpdateMeRequest, UserResponse};
use deals_types::models::Role;
use deals_types::validate;

use crate::Paging;
use crate::auth::{AppState, hash_password};
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::{comments, coupons, promotions};

pub(crate) fn user_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: row.id,
        email: row.email,
        username: row.username,
        full_name: row.full_name,
        role: row.role,
        is_active: row.is_active,
        is_verified: row.is_verified,
        created_at: row.created_at,
    }
}

fn public_user_response(row: UserRow) -> PublicUserResponse {
    PublicUserResponse {
        id: row.id,
        username: row.username,
        full_name: row.full_name,
        role: row.role,
        created_at: row.created_at,
    }
}

fn load(state: &AppState, id: Uuid) -> Result<UserRow, ApiError> {
    state
        .db
        .get_user_by_id(id)?
        .ok_or(ApiError::NotFound("user not found"))
}

/// Deletes an account. Accounts that made moderation decisions are kept for
/// the record.
fn remove_account(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    match state.db.delete_user(id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(ApiError::NotFound("user not found")),
        Err(e) if is_foreign_key_violation(&e) => Err(ApiError::Conflict(
            "account has moderation decisions on record and cannot be deleted".into(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(user_response(load(&state, me.id)?)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<UpdateMeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.map(|e| e.trim().to_lowercase());
    if let Some(email) = &email {
        validate::email(email)?;
    }
    if let Some(username) = &req.username {
        validate::username(username)?;
    }
    validate::optional_length("full_name", req.full_name.as_deref(), 100)?;
    let password_hash = match &req.password {
        Some(password) => {
            validate::password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    let updated = state
        .db
        .update_user(
            me.id,
            &UserChanges {
                email,
                username: req.username,
                full_name: req.full_name,
                password_hash,
            },
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("email or username is already registered".into())
            } else {
                e.into()
            }
        })?
        .ok_or(ApiError::NotFound("user not found"))?;

    // A new password signs out every other session
    if req.password.is_some() {
        state.db.revoke_user_tokens(me.id)?;
    }

    Ok(Json(user_response(updated)))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    remove_account(&state, me.id)?;
    info!("User {} deleted their account", me.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = load(&state, id)?;
    if !user.is_active {
        return Err(ApiError::NotFound("user not found"));
    }
    Ok(Json(public_user_response(user)))
}

/// Staff may delete accounts, but only admins may delete other staff.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Capability::ManageUsers)?;

    let target = load(&state, id)?;
    if target.role != Role::User && target.id != me.id {
        me.require(Capability::AssignRoles)?;
    }

    remove_account(&state, id)?;
    warn!("User {} deleted by {}", target.username, me.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Json(req): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    me.require(Capability::AssignRoles)?;
    if id == me.id {
        return Err(ApiError::Forbidden("admins cannot change their own role"));
    }

    let updated = state
        .db
        .set_user_role(id, req.role)?
        .ok_or(ApiError::NotFound("user not found"))?;

    info!("{} set role of {} to {}", me.username, updated.username, updated.role);
    Ok(Json(user_response(updated)))
}

fn require_self_or_staff(me: &CurrentUser, user_id: Uuid) -> Result<(), ApiError> {
    me.require_owner_or(user_id, Capability::ManageUsers)
}

pub async fn user_promotions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, ApiError> {
    require_self_or_staff(&me, id)?;
    Ok(Json(promotions::list_by_owner(&state, id, paging)?))
}

pub async fn user_coupons(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, ApiError> {
    require_self_or_staff(&me, id)?;
    Ok(Json(coupons::list_by_owner(&state, id, paging)?))
}

pub async fn user_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(me): Extension<CurrentUser>,
    Query(paging): Query<Paging>,
) -> Result<impl IntoResponse, ApiError> {
    require_self_or_staff(&me, id)?;
    Ok(Json(comments::list_by_author(&state, id, paging)?))
}
