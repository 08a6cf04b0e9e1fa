use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;
use uuid::Uuid;

use deals_types::access::Capability;
use deals_types::api::Claims;
use deals_types::models::Role;

use crate::auth::AppState;
use crate::error::ApiError;

/// The authenticated caller, as currently stored (not as the token claims).
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn require(&self, cap: Capability) -> Result<(), ApiError> {
        if self.role.can(cap) {
            Ok(())
        } else {
            debug!("{} ({}) lacks {:?}", self.username, self.role, cap);
            Err(ApiError::Forbidden("insufficient role"))
        }
    }

    /// Owners pass; everyone else needs `cap`.
    pub fn require_owner_or(&self, owner: Uuid, cap: Capability) -> Result<(), ApiError> {
        if self.role.owner_or(self.id, owner, cap) {
            Ok(())
        } else {
            debug!("{} is not the owner and lacks {:?}", self.username, cap);
            Err(ApiError::Forbidden("not allowed to modify this resource"))
        }
    }
}

/// Extract and validate the JWT from the Authorization header, then load the
/// account it names.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("missing bearer token"))?;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized("invalid or expired token"))?
    .claims;

    // Role changes and deactivation take effect immediately
    let user = state
        .db
        .get_user_by_id(claims.sub)?
        .ok_or(ApiError::Unauthorized("account no longer exists"))?;
    if !user.is_active {
        return Err(ApiError::Forbidden("account is disabled"));
    }

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        username: user.username,
        role: user.role,
    });
    Ok(next.run(req).await)
}
