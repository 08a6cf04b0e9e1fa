#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use deals_api::{ApiConfig, AppState, AppStateInner, router};
use deals_db::Database;
use deals_types::models::Role;

pub const PASSWORD: &str = "hunter2hunter2";
pub const ADMIN_EMAIL: &str = "admin@example.com";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub struct Account {
    pub id: Uuid,
    pub token: String,
}

pub fn app() -> TestApp {
    app_with(ApiConfig {
        admin_emails: vec![ADMIN_EMAIL.to_string()],
        ..Default::default()
    })
}

pub fn app_with(config: ApiConfig) -> TestApp {
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        config,
    });
    TestApp {
        router: router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(req).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, name: &str) -> Account {
        let (status, body) = self
            .post(
                "/auth/register",
                None,
                json!({
                    "email": format!("{name}@example.com"),
                    "username": name,
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        account(&body)
    }

    /// Registers an account and promotes it straight in the database.
    pub async fn register_as(&self, name: &str, role: Role) -> Account {
        let account = self.register(name).await;
        self.state.db.set_user_role(account.id, role).unwrap();
        account
    }

    pub async fn submit_promotion(&self, owner: &Account, title: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/promotions",
                Some(&owner.token),
                json!({
                    "title": title,
                    "link": "https://shop.example.com/deal",
                    "price": 49.5,
                    "original_price": 99.0,
                    "store": "Example Store",
                    "category": "electronics",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }

    pub async fn submit_coupon(&self, owner: &Account, code: &str) -> Uuid {
        let (status, body) = self
            .post(
                "/coupons",
                Some(&owner.token),
                json!({
                    "title": format!("{code} voucher"),
                    "code": code,
                    "link": "https://shop.example.com",
                    "store": "Example Store",
                    "discount_value": "15%",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }

    pub async fn approve_promotion(&self, moderator: &Account, id: Uuid) {
        let (status, body) = self
            .put(&format!("/promotions/{id}/approve"), Some(&moderator.token), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

pub fn account(token_response: &Value) -> Account {
    Account {
        id: token_response["user"]["id"].as_str().unwrap().parse().unwrap(),
        token: token_response["access_token"].as_str().unwrap().to_string(),
    }
}

pub fn id_of(body: &Value) -> Uuid {
    body["id"].as_str().unwrap().parse().unwrap()
}

pub fn ids(list: &Value) -> Vec<Uuid> {
    list.as_array().unwrap().iter().map(id_of).collect()
}
