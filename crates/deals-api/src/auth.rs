use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::RngCore;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use deals_db::models::UserRow;
use deals_db::queries::NewUser;
use deals_db::{Database, is_unique_violation};
use deals_types::api::{Claims, LoginRequest, RegisterRequest, TokenResponse};
use deals_types::models::Role;
use deals_types::validate;

use crate::error::ApiError;
use crate::extract::Json;
use crate::users::user_response;

pub const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/auth";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub config: ApiConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Accounts registered with one of these emails start out as admins.
    pub admin_emails: Vec<String>,
    /// When set, owners cannot edit a submission once it has been decided.
    pub lock_decided_content: bool,
    pub secure_cookies: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(30),
            refresh_token_ttl: Duration::days(7),
            admin_emails: Vec::new(),
            lock_decided_content: true,
            secure_cookies: false,
        }
    }
}

impl ApiConfig {
    fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_lowercase();
    validate::email(&email)?;
    validate::username(&req.username)?;
    validate::password(&req.password)?;
    validate::optional_length("full_name", req.full_name.as_deref(), 100)?;

    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };

    let user = state
        .db
        .create_user(&NewUser {
            id: Uuid::new_v4(),
            email,
            username: req.username,
            password_hash: hash_password(&req.password)?,
            full_name: req.full_name,
            role,
        })
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("email or username is already registered".into())
            } else {
                e.into()
            }
        })?;

    info!("Registered user {} as {}", user.username, user.role);

    let (jar, body) = start_session(&state, jar, user)?;
    Ok((StatusCode::CREATED, jar, Json(body)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_email(&req.email.trim().to_lowercase())?
        .ok_or(ApiError::Unauthorized("invalid email or password"))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| anyhow::anyhow!("stored password hash is malformed: {e}"))?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        debug!("Failed login for {}", user.username);
        return Err(ApiError::Unauthorized("invalid email or password"));
    }

    if !user.is_active {
        return Err(ApiError::Forbidden("account is disabled"));
    }

    let (jar, body) = start_session(&state, jar, user)?;
    Ok((jar, Json(body)))
}

/// Trades the refresh cookie for a new access token. The old refresh token is
/// consumed and a new one is set.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::Unauthorized("missing refresh token"))?;

    let user_id = state
        .db
        .take_refresh_token(&hash_token(&token), Utc::now())?
        .ok_or(ApiError::Unauthorized("invalid or expired refresh token"))?;

    let user = state
        .db
        .get_user_by_id(user_id)?
        .filter(|u| u.is_active)
        .ok_or(ApiError::Unauthorized("invalid or expired refresh token"))?;

    let (jar, body) = start_session(&state, jar, user)?;
    Ok((jar, Json(body)))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        state.db.revoke_refresh_token(&hash_token(cookie.value()))?;
    }

    let mut expired = Cookie::from(REFRESH_COOKIE);
    expired.set_path(REFRESH_COOKIE_PATH);
    Ok((jar.remove(expired), StatusCode::NO_CONTENT))
}

/// Issues an access token and a fresh refresh cookie for `user`.
fn start_session(
    state: &AppStateInner,
    jar: CookieJar,
    user: UserRow,
) -> Result<(CookieJar, TokenResponse), ApiError> {
    let ttl = state.config.access_token_ttl;
    let access_token = create_token(&state.jwt_secret, &user, ttl)?;

    let refresh_token = new_refresh_token();
    state.db.store_refresh_token(
        user.id,
        &hash_token(&refresh_token),
        Utc::now() + state.config.refresh_token_ttl,
    )?;

    let cookie = Cookie::build((REFRESH_COOKIE, refresh_token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path(REFRESH_COOKIE_PATH)
        .secure(state.config.secure_cookies);

    Ok((
        jar.add(cookie),
        TokenResponse {
            access_token,
            token_type: "bearer",
            expires_in: ttl.num_seconds(),
            user: user_response(user),
        },
    ))
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string();
    Ok(hash)
}

pub fn create_token(secret: &str, user: &UserRow, ttl: Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: user.role,
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn new_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Refresh tokens are stored as their SHA-256 hex digest.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    fn row(role: Role) -> UserRow {
        UserRow {
            id: Uuid::new_v4(),
            email: "a@example.com".into(),
            username: "alice".into(),
            password_hash: String::new(),
            full_name: None,
            role,
            is_active: true,
            is_verified: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn token_carries_id_and_role() {
        let user = row(Role::Moderator);
        let token = create_token("secret", &user, Duration::minutes(5)).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, user.id);
        assert_eq!(data.claims.role, Role::Moderator);
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("correct horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"correct horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong horse", &parsed).is_err());
    }

    #[test]
    fn refresh_tokens_are_random_and_hashed() {
        let a = new_refresh_token();
        let b = new_refresh_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert_eq!(hash_token(&a).len(), 64);
        assert_eq!(hash_token(&a), hash_token(&a));
    }

    #[test]
    fn admin_emails_match_case_insensitively() {
        let config = ApiConfig {
            admin_emails: vec!["Boss@Example.com".into()],
            ..Default::default()
        };
        assert!(config.is_admin_email("boss@example.com"));
        assert!(!config.is_admin_email("intern@example.com"));
    }
}
