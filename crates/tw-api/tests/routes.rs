//! End-to-end route tests: the real router over an in-memory SQLite store.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;
use tw_api::{router, AppState};
use tw_auth_jwt::JwtTokenIssuer;
use tw_core::models::{Collection, Document, InsertOutcome, RecordId};
use tw_core::traits::{DocumentStore, TokenIssuer};
use tw_db_sqlite::SqliteDocumentStore;

struct TestApp {
    app: Router,
    store: Arc<SqliteDocumentStore>,
    tokens: Arc<JwtTokenIssuer>,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_enforcement(false).await
    }

    async fn with_enforcement(enforce_auth: bool) -> Self {
        let store = Arc::new(SqliteDocumentStore::new("sqlite::memory:").await.unwrap());
        let tokens = Arc::new(JwtTokenIssuer::new(
            &SecretString::from("test-secret".to_string()),
            Duration::from_secs(7200),
        ));
        let app = router(AppState {
            store: store.clone(),
            tokens: tokens.clone(),
            enforce_auth,
        });
        Self { app, store, tokens }
    }

    async fn seed(&self, collection: Collection, value: Value) -> RecordId {
        let Value::Object(document) = value else { panic!("seed must be an object") };
        match self.store.insert(collection, document).await.unwrap() {
            InsertOutcome::Inserted(result) => result.inserted_id,
            InsertOutcome::Duplicate => panic!("seed collided"),
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json_with_token(method, uri, body, None).await
    }

    async fn json_with_token(&self, method: Method, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }
}

fn field_values(body: &Value, field: &str) -> Vec<Value> {
    body.as_array().unwrap().iter().map(|doc| doc[field].clone()).collect()
}

#[tokio::test]
async fn root_reports_liveness() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Tech world server is running"));
}

#[tokio::test]
async fn list_fetches_are_idempotent() {
    let app = TestApp::new().await;
    app.seed(Collection::Featured, json!({ "name": "Mouse", "up_vote": 2 })).await;
    app.seed(Collection::Products, json!({ "name": "Laptop", "tags": "Laptop" })).await;
    app.seed(Collection::Reviews, json!({ "rating": 5 })).await;

    for uri in ["/features", "/allProducts", "/reviews"] {
        let (first_status, first) = app.get(uri).await;
        let (_, second) = app.get(uri).await;
        assert_eq!(first_status, StatusCode::OK, "{uri}");
        assert_eq!(first.as_array().unwrap().len(), 1, "{uri}");
        assert_eq!(first, second, "{uri}");
    }
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = TestApp::new().await;
    let user = json!({ "email": "ada@tech.world", "name": "Ada" });

    let (status, body) = app.json(Method::POST, "/users", user.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["acknowledged"], json!(true));
    assert!(body["insertedId"].is_string());

    let (status, body) = app.json(Method::POST, "/users", json!({ "email": "ada@tech.world", "name": "Imposter" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "message": "User already exist" }));

    let (_, stored) = app.get("/user/admin/ada@tech.world").await;
    assert_eq!(stored["name"], json!("Ada"));
    assert_eq!(app.store.find_all(Collection::Users, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn user_without_email_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::POST, "/users", json!({ "name": "anon" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn unknown_admin_email_returns_null() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/user/admin/nobody@tech.world").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn duplicate_report_is_a_conflict() {
    let app = TestApp::new().await;
    let product = app.seed(Collection::Products, json!({ "tags": "Camera" })).await;
    let report = json!({ "reportedId": product.as_str(), "reason": "spam" });

    let (status, _) = app.json(Method::POST, "/reports", report.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.json(Method::POST, "/reports", report).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "message": "already reported" }));
    assert_eq!(app.store.find_all(Collection::Reported, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reviews_are_inserted_unconditionally() {
    let app = TestApp::new().await;
    let review = json!({ "productId": "p1", "comment": "great" });

    assert_eq!(app.json(Method::POST, "/reviews", review.clone()).await.0, StatusCode::OK);
    assert_eq!(app.json(Method::POST, "/reviews", review).await.0, StatusCode::OK);

    let (_, reviews) = app.get("/reviews").await;
    assert_eq!(reviews.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn vote_patch_applies_supplied_value() {
    let app = TestApp::new().await;
    let id = app.seed(Collection::Featured, json!({ "name": "Keyboard", "up_vote": 41 })).await;

    let (status, body) = app.json(Method::PATCH, &format!("/features/{id}"), json!({ "upVote": 7 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchedCount"], json!(1));
    assert_eq!(body["modifiedCount"], json!(1));

    let (_, features) = app.get("/features").await;
    assert_eq!(field_values(&features, "up_vote"), vec![json!(7)]);
}

#[tokio::test]
async fn vote_patch_works_for_trending_and_products() {
    let app = TestApp::new().await;
    let trending = app.seed(Collection::Trending, json!({ "up_vote": 1 })).await;
    let product = app.seed(Collection::Products, json!({ "tags": "Drone", "up_vote": 0 })).await;

    let (status, _) = app.json(Method::PATCH, &format!("/trending/{trending}"), json!({ "upVote": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::PATCH, &format!("/product/{product}"), json!({ "upVote": -1 })).await;
    assert_eq!(status, StatusCode::OK);

    let (_, trending) = app.get("/trending").await;
    assert_eq!(field_values(&trending, "up_vote"), vec![json!(2)]);
    let (_, products) = app.get("/allProducts").await;
    assert_eq!(field_values(&products, "up_vote"), vec![json!(-1)]);
}

#[tokio::test]
async fn vote_patch_on_unknown_id_matches_nothing() {
    let app = TestApp::new().await;
    app.seed(Collection::Featured, json!({ "up_vote": 3 })).await;

    let (status, body) = app.json(Method::PATCH, "/features/0123456789abcdef01234567", json!({ "upVote": 9 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["matchedCount"], json!(0));
    assert_eq!(body["modifiedCount"], json!(0));

    let (_, features) = app.get("/features").await;
    assert_eq!(field_values(&features, "up_vote"), vec![json!(3)]);
}

#[tokio::test]
async fn vote_patch_requires_integer_up_vote() {
    let app = TestApp::new().await;
    let id = app.seed(Collection::Featured, json!({ "up_vote": 3 })).await;

    let (status, _) = app.json(Method::PATCH, &format!("/features/{id}"), json!({ "upVote": "many" })).await;
    assert!(status.is_client_error());
    let (status, _) = app.json(Method::PATCH, &format!("/features/{id}"), json!({})).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn trending_sort_direction_follows_query() {
    let app = TestApp::new().await;
    for vote in [3, 1, 2] {
        app.seed(Collection::Trending, json!({ "up_vote": vote })).await;
    }

    let (_, default_order) = app.get("/trending").await;
    assert_eq!(field_values(&default_order, "up_vote"), vec![json!(3), json!(2), json!(1)]);

    let (_, largest) = app.get("/trending?query=largest").await;
    assert_eq!(field_values(&largest, "up_vote"), vec![json!(1), json!(2), json!(3)]);

    let (_, other) = app.get("/trending?query=smallest").await;
    assert_eq!(field_values(&other, "up_vote"), vec![json!(3), json!(2), json!(1)]);
}

#[tokio::test]
async fn product_search_is_case_insensitive_substring() {
    let app = TestApp::new().await;
    app.seed(Collection::Products, json!({ "name": "ThinkPad", "tags": "Laptop" })).await;
    app.seed(Collection::Products, json!({ "name": "Pixel", "tags": "Phone" })).await;

    for needle in ["lap", "LAPTOP", "apt"] {
        let (status, body) = app.get(&format!("/products?search={needle}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(field_values(&body, "name"), vec![json!("ThinkPad")], "search={needle}");
    }

    let (_, none) = app.get("/products?search=tablet").await;
    assert!(none.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn empty_product_search_lists_everything() {
    let app = TestApp::new().await;
    app.seed(Collection::Products, json!({ "tags": "Laptop" })).await;
    app.seed(Collection::Products, json!({ "name": "untagged" })).await;

    let (_, all) = app.get("/products").await;
    assert_eq!(all.as_array().unwrap().len(), 2);
    let (_, empty) = app.get("/products?search=").await;
    assert_eq!(empty.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn jwt_issues_verifiable_two_hour_token() {
    let app = TestApp::new().await;
    let (status, body) = app.json(Method::POST, "/jwt", json!({ "email": "ada@tech.world" })).await;
    assert_eq!(status, StatusCode::OK);

    let token = body["token"].as_str().unwrap();
    let claims: Document = app.tokens.verify(token).unwrap();
    assert_eq!(claims["email"], json!("ada@tech.world"));
    assert_eq!(claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(), 7200);
}

#[tokio::test]
async fn tokens_are_not_checked_unless_enforced() {
    let app = TestApp::new().await;
    let id = app.seed(Collection::Featured, json!({ "up_vote": 0 })).await;

    let (status, _) = app
        .json_with_token(Method::PATCH, &format!("/features/{id}"), json!({ "upVote": 1 }), Some("garbage"))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn enforced_auth_guards_mutating_routes() {
    let app = TestApp::with_enforcement(true).await;
    let id = app.seed(Collection::Featured, json!({ "up_vote": 0 })).await;
    let uri = format!("/features/{id}");

    let (status, body) = app.json(Method::PATCH, &uri, json!({ "upVote": 1 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "unauthorized access" }));

    let (status, _) = app.json_with_token(Method::PATCH, &uri, json!({ "upVote": 1 }), Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.json(Method::POST, "/reviews", json!({ "comment": "hi" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Registration, token issuance and reads stay open.
    assert_eq!(app.json(Method::POST, "/users", json!({ "email": "a@b.c" })).await.0, StatusCode::OK);
    assert_eq!(app.get("/features").await.0, StatusCode::OK);

    let (_, issued) = app.json(Method::POST, "/jwt", json!({ "email": "a@b.c" })).await;
    let token = issued["token"].as_str().unwrap().to_string();

    let (status, body) = app.json_with_token(Method::PATCH, &uri, json!({ "upVote": 1 }), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["modifiedCount"], json!(1));
}
