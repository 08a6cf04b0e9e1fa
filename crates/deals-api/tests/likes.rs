mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use deals_types::models::Role;

use common::{app, id_of};

#[tokio::test]
async fn toggle_twice_returns_to_unliked() {
    let app = app();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let promo = app.submit_promotion(&alice, "Cheap 4K TV").await;
    let target = json!({ "target_kind": "promotion", "target_id": promo });

    let (status, body) = app.post("/likes/toggle", Some(&bob.token), target.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "liked", "likes_count": 1 }));

    let check = format!("/likes/check?target_kind=promotion&target_id={promo}");
    let (_, body) = app.get(&check, Some(&bob.token)).await;
    assert_eq!(body["liked"], true);

    let (_, body) = app.post("/likes/toggle", Some(&bob.token), target).await;
    assert_eq!(body, json!({ "status": "unliked", "likes_count": 0 }));

    let (_, body) = app.get(&check, Some(&bob.token)).await;
    assert_eq!(body["liked"], false);
}

#[tokio::test]
async fn likes_are_counted_per_user() {
    let app = app();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let moderator = app.register_as("mod", Role::Moderator).await;
    let promo = app.submit_promotion(&alice, "Cheap 4K TV").await;
    let target = json!({ "target_kind": "promotion", "target_id": promo });

    app.post("/likes/toggle", Some(&alice.token), target.clone()).await;
    let (_, body) = app.post("/likes/toggle", Some(&bob.token), target).await;
    assert_eq!(body["likes_count"], 2);

    let (status, body) = app
        .get(&format!("/likes/count?target_kind=promotion&target_id={promo}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    app.approve_promotion(&moderator, promo).await;
    let (_, detail) = app.get(&format!("/promotions/{promo}"), None).await;
    assert_eq!(detail["likes_count"], 2);
}

#[tokio::test]
async fn strict_like_and_unlike() {
    let app = app();
    let alice = app.register("alice").await;
    let coupon = app.submit_coupon(&alice, "save15").await;
    let target = json!({ "target_kind": "coupon", "target_id": coupon });

    let (status, body) = app.post("/likes", Some(&alice.token), target.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["target_kind"], "coupon");
    assert_eq!(body["user_id"], alice.id.to_string());

    let (status, _) = app.post("/likes", Some(&alice.token), target).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let unlike = format!("/likes?target_kind=coupon&target_id={coupon}");
    let (status, _) = app.delete(&unlike, Some(&alice.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete(&unlike, Some(&alice.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_targets_cannot_be_liked() {
    let app = app();
    let alice = app.register("alice").await;
    let promo = app.submit_promotion(&alice, "Cheap 4K TV").await;

    let (status, _) = app
        .post(
            "/likes/toggle",
            Some(&alice.token),
            json!({ "target_kind": "promotion", "target_id": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The id exists, but as a promotion
    let (status, _) = app
        .post(
            "/likes/toggle",
            Some(&alice.token),
            json!({ "target_kind": "coupon", "target_id": promo }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .post(
            "/likes/toggle",
            None,
            json!({ "target_kind": "promotion", "target_id": promo }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn comments_can_be_liked_until_removed() {
    let app = app();
    let alice = app.register("alice").await;
    let bob = app.register("bob").await;
    let promo = app.submit_promotion(&alice, "Cheap 4K TV").await;

    let (_, comment) = app
        .post(
            "/comments",
            Some(&bob.token),
            json!({ "content": "great find", "promotion_id": promo }),
        )
        .await;
    let comment = id_of(&comment);
    let target = json!({ "target_kind": "comment", "target_id": comment });

    let (status, body) = app.post("/likes/toggle", Some(&alice.token), target.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "liked");

    let (_, listed) = app
        .get(&format!("/comments?promotion_id={promo}"), None)
        .await;
    assert_eq!(listed[0]["likes_count"], 1);

    app.delete(&format!("/comments/{comment}"), Some(&bob.token)).await;
    let (status, _) = app.post("/likes/toggle", Some(&alice.token), target).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
