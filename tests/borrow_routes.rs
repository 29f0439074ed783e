//! In-process tests of the borrow routes against the in-memory store

use std::sync::{Arc, Mutex};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use circulation_server::{
    api,
    config::AppConfig,
    models::user::{Role, UserClaims},
    repository::MemoryDatabase,
    services::{clock::Clock, Services},
    AppState,
};

const SECRET: &str = "test-secret";

/// Clock the tests move forward by hand
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
    admin_token: String,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = SECRET.to_string();

        let clock = Arc::new(ManualClock(Mutex::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        )));
        let database = Arc::new(MemoryDatabase::seeded().await);
        let services = Services::with_clock(database, config.loans.clone(), clock.clone());

        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };

        TestApp {
            router: api::router(state),
            clock,
            admin_token: token(Role::Admin),
        }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let token = self.admin_token.clone();
        self.send(method, uri, Some(&token), body).await
    }

    async fn borrow(&self, member_id: i32, book_id: i32, borrow_days: i64) -> (StatusCode, Value) {
        self.admin(
            Method::POST,
            "/api/v1/borrow",
            Some(json!({ "memberId": member_id, "bookId": book_id, "borrowDays": borrow_days })),
        )
        .await
    }
}

fn token(role: Role) -> String {
    let now = Utc::now();
    UserClaims {
        sub: "desk".to_string(),
        user_id: 1,
        role,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    }
    .create_token(SECRET)
    .unwrap()
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_borrow_returns_created_envelope() {
    let app = TestApp::new().await;

    let (status, body) = app.borrow(1, 2, 14).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["statusCode"], 201);
    assert_eq!(body["data"]["memberId"], 1);
    assert_eq!(body["data"]["bookId"], 2);
    assert_eq!(body["data"]["isReturned"], false);
    assert_eq!(body["data"]["state"], "active");
    assert_eq!(body["data"]["member"]["memberCode"], "M0001");
    assert_eq!(body["data"]["book"]["title"], "The Rust Programming Language");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/v1/borrow/current", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 401);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_non_admin_is_forbidden() {
    let app = TestApp::new().await;
    let user_token = token(Role::User);

    let (status, body) = app
        .send(Method::GET, "/api/v1/borrow/current", Some(&user_token), None)
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["statusCode"], 403);
}

#[tokio::test]
async fn test_borrow_unknown_references_are_bad_requests() {
    let app = TestApp::new().await;

    let (status, body) = app.borrow(99, 1, 7).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app.borrow(1, 99, 7).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_borrow_rejects_inactive_member_and_bad_days() {
    let app = TestApp::new().await;

    let (status, _) = app.borrow(3, 1, 7).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.borrow(1, 1, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.borrow(1, 1, 91).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_last_copy_cannot_be_borrowed_twice() {
    let app = TestApp::new().await;

    let (status, _) = app.borrow(1, 3, 7).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.borrow(2, 3, 7).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("out of stock"));
}

#[tokio::test]
async fn test_late_return_persists_fine_and_pay_fine() {
    let app = TestApp::new().await;

    let (_, body) = app.borrow(1, 1, 1).await;
    let id = body["data"]["borrowId"].as_i64().unwrap();

    // one day and one hour late: two started days
    app.clock.advance(Duration::seconds(86_400 + 90_000));

    let (status, body) = app
        .admin(Method::PUT, &format!("/api/v1/borrow/{}/return", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isReturned"], true);
    assert_eq!(body["data"]["state"], "returned");
    assert_eq!(decimal(&body["data"]["fineAmount"]), Decimal::from(10_000));
    assert_eq!(body["data"]["finePaid"], false);

    let (status, _) = app
        .admin(Method::PUT, &format!("/api/v1/borrow/{}/return", id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .admin(Method::PUT, &format!("/api/v1/borrow/{}/pay-fine", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["finePaid"], true);
}

#[tokio::test]
async fn test_pay_fine_without_fine_is_rejected() {
    let app = TestApp::new().await;

    let (_, body) = app.borrow(1, 1, 7).await;
    let id = body["data"]["borrowId"].as_i64().unwrap();

    let (status, body) = app
        .admin(Method::PUT, &format!("/api/v1/borrow/{}/pay-fine", id), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_extend_moves_due_date() {
    let app = TestApp::new().await;

    let (_, body) = app.borrow(1, 1, 7).await;
    let id = body["data"]["borrowId"].as_i64().unwrap();
    let due: DateTime<Utc> = serde_json::from_value(body["data"]["dueDate"].clone()).unwrap();

    let (status, body) = app
        .admin(
            Method::PUT,
            &format!("/api/v1/borrow/{}/extend", id),
            Some(json!({ "extendDays": 7, "notes": "holiday" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let extended: DateTime<Utc> = serde_json::from_value(body["data"]["dueDate"].clone()).unwrap();
    assert_eq!(extended, due + Duration::days(7));
    assert_eq!(body["data"]["notes"], "holiday");

    let (status, _) = app
        .admin(
            Method::PUT,
            &format!("/api/v1/borrow/{}/extend", id),
            Some(json!({ "extendDays": 61 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_extend_overdue_is_rejected() {
    let app = TestApp::new().await;

    let (_, body) = app.borrow(1, 1, 1).await;
    let id = body["data"]["borrowId"].as_i64().unwrap();
    app.clock.advance(Duration::days(2));

    let (status, body) = app
        .admin(
            Method::PUT,
            &format!("/api/v1/borrow/{}/extend", id),
            Some(json!({ "extendDays": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("overdue"));
}

#[tokio::test]
async fn test_unknown_borrow_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app.admin(Method::GET, "/api/v1/borrow/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["statusCode"], 404);

    let (status, _) = app
        .admin(Method::PUT, "/api/v1/borrow/42/return", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_overdue_listing_previews_fines() {
    let app = TestApp::new().await;

    app.borrow(1, 1, 1).await;
    app.borrow(2, 2, 30).await;
    app.clock.advance(Duration::days(3));

    let (status, body) = app.admin(Method::GET, "/api/v1/borrow/overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["memberId"], 1);
    assert_eq!(decimal(&records[0]["fineAmount"]), Decimal::from(10_000));
    assert_eq!(records[0]["isReturned"], false);

    let (_, body) = app.admin(Method::GET, "/api/v1/borrow/current", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_search_filters_by_member_and_status() {
    let app = TestApp::new().await;

    let (_, body) = app.borrow(1, 1, 7).await;
    let returned_id = body["data"]["borrowId"].as_i64().unwrap();
    app.borrow(1, 2, 7).await;
    app.borrow(2, 1, 7).await;
    app.admin(Method::PUT, &format!("/api/v1/borrow/{}/return", returned_id), None)
        .await;

    let (status, body) = app
        .admin(Method::GET, "/api/v1/borrow?memberId=1&status=returned", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["borrowId"], returned_id);

    let (_, body) = app.admin(Method::GET, "/api/v1/borrow?bookId=1", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_member_borrows() {
    let app = TestApp::new().await;

    app.borrow(2, 1, 7).await;

    let (status, body) = app.admin(Method::GET, "/api/v1/members/2/borrows", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app.admin(Method::GET, "/api/v1/members/77/borrows", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_statistics() {
    let app = TestApp::new().await;

    let (_, body) = app.borrow(1, 1, 1).await;
    let id = body["data"]["borrowId"].as_i64().unwrap();
    app.borrow(2, 1, 30).await;
    app.borrow(2, 2, 30).await;
    app.clock.advance(Duration::days(2));
    app.admin(Method::PUT, &format!("/api/v1/borrow/{}/return", id), None)
        .await;

    let (status, body) = app.admin(Method::GET, "/api/v1/borrow/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["totalBorrows"], 3);
    assert_eq!(stats["currentBorrows"], 2);
    assert_eq!(stats["overdueBorrows"], 0);
    assert_eq!(stats["returnedBorrows"], 1);
    assert_eq!(decimal(&stats["totalFines"]), Decimal::from(5_000));
    assert_eq!(decimal(&stats["unpaidFines"]), Decimal::from(5_000));
    assert_eq!(stats["popularBooks"][0]["bookId"], 1);
    assert_eq!(stats["popularBooks"][0]["borrowCount"], 2);
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.send(Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_malformed_path_id_uses_error_envelope() {
    let app = TestApp::new().await;

    let (status, body) = app.admin(Method::GET, "/api/v1/borrow/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 400);
    assert!(body["data"].is_null());
    assert!(body["message"].is_string());

    let (status, body) = app
        .admin(Method::PUT, "/api/v1/borrow/abc/return", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);

    let (status, body) = app.admin(Method::GET, "/api/v1/members/x/borrows", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_unknown_status_filter_uses_error_envelope() {
    let app = TestApp::new().await;

    let (status, body) = app.admin(Method::GET, "/api/v1/borrow?status=lost", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 400);
    assert!(body["data"].is_null());

    let (status, body) = app.admin(Method::GET, "/api/v1/borrow?memberId=one", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
}
