use axum::{
    Json, Router, middleware,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{comments, coupons, likes, moderation, promotions, users};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// All HTTP routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/users/{id}", get(users::get_user))
        .route("/promotions", get(promotions::list_promotions))
        .route("/promotions/{id}", get(promotions::get_promotion))
        .route("/promotions/{id}/click", post(promotions::click_promotion))
        .route("/coupons", get(coupons::list_coupons))
        .route("/coupons/{id}", get(coupons::get_coupon))
        .route("/coupons/{id}/use", post(coupons::use_coupon))
        .route("/comments", get(comments::list_comments))
        .route("/likes/count", get(likes::count_likes))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(users::me).put(users::update_me).delete(users::delete_me),
        )
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/role", put(users::set_role))
        .route("/users/{id}/promotions", get(users::user_promotions))
        .route("/users/{id}/coupons", get(users::user_coupons))
        .route("/users/{id}/comments", get(users::user_comments))
        .route("/promotions", post(promotions::create_promotion))
        .route("/promotions/pending", get(promotions::pending_promotions))
        .route(
            "/promotions/{id}",
            put(promotions::update_promotion).delete(promotions::delete_promotion),
        )
        .route("/promotions/{id}/approve", put(promotions::approve_promotion))
        .route("/promotions/{id}/reject", put(promotions::reject_promotion))
        .route("/coupons", post(coupons::create_coupon))
        .route("/coupons/pending", get(coupons::pending_coupons))
        .route(
            "/coupons/{id}",
            put(coupons::update_coupon).delete(coupons::delete_coupon),
        )
        .route("/coupons/{id}/approve", put(coupons::approve_coupon))
        .route("/coupons/{id}/reject", put(coupons::reject_coupon))
        .route("/comments", post(comments::create_comment))
        .route(
            "/comments/{id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/moderation/comments", get(moderation::list_comments))
        .route("/likes", post(likes::like).delete(likes::unlike))
        .route("/likes/toggle", post(likes::toggle_like))
        .route("/likes/check", get(likes::check_like))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
