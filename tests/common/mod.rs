#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;
use vehicle_entries::AppState;
use vehicle_entries::config::Config;
use vehicle_entries::permissions::Role;
use vehicle_entries::router::create_router;
use vehicle_entries::routes::auth::{RegisterRequest, User};
use vehicle_entries::routes::entry::{CreateEntryRequest, Destinations, VehicleEntry};

/// Connects to `DATABASE_URL` and brings the schema up to date.
pub async fn pool() -> PgPool {
    let _ = dotenv::dotenv();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .expect("connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

pub fn unique_username(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

pub async fn create_user(pool: &PgPool, role: Role, password: &str) -> User {
    User::create(
        pool,
        &RegisterRequest {
            username: unique_username("t"),
            password: password.to_string(),
            full_name: "Test Admin".into(),
            role,
        },
    )
    .await
    .expect("create user")
}

pub fn entry_request() -> CreateEntryRequest {
    CreateEntryRequest {
        visitor_name: "Ana".into(),
        visitor_surname: "Pérez".into(),
        national_id: "0102030405".into(),
        vehicle_types: vec!["Carro".into()],
        plate: "PBC-1234".into(),
        destinations: Destinations::from([("Entidades".to_string(), vec!["Área 1".to_string()])]),
        entered_at: None,
        exited_at: None,
    }
}

pub async fn create_entry(pool: &PgPool) -> VehicleEntry {
    VehicleEntry::create(pool, entry_request())
        .await
        .expect("create entry")
}

/// Moves an entry's creation time into the past.
pub async fn backdate(pool: &PgPool, id: Uuid, days: i64) {
    backdate_by(pool, id, chrono::Duration::days(days)).await;
}

pub async fn backdate_by(pool: &PgPool, id: Uuid, age: chrono::Duration) {
    sqlx::query(
        "UPDATE vehicle_entries SET created_at = NOW() - make_interval(secs => $2) WHERE id = $1",
    )
    .bind(id)
    .bind(age.num_seconds() as f64)
    .execute(pool)
    .await
    .expect("backdate entry");
}

pub fn temp_upload_dir() -> PathBuf {
    std::env::temp_dir().join(format!("vehicle-entries-{}", Uuid::new_v4()))
}

pub fn config(upload_dir: PathBuf) -> Config {
    Config {
        database_url: std::env::var("DATABASE_URL").unwrap_or_default(),
        redis_url: "redis://127.0.0.1/".into(),
        jwt_secret: "integration-secret".into(),
        jwt_expiration_secs: 3600,
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        server_host: "127.0.0.1".into(),
        server_port: 3000,
        api_base_uri: "/api".into(),
        upload_dir,
        seed_admin_password: None,
    }
}

/// The full router over the test database, without the redis rate limiter.
pub fn app(pool: PgPool, upload_dir: PathBuf) -> Router {
    let config = config(upload_dir);
    let redis = Arc::new(redis::Client::open(config.redis_url.clone()).expect("redis url"));
    create_router(AppState {
        pool,
        config,
        redis,
    })
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Creates a user of `role` and logs in through the API, returning the bearer token.
pub async fn login_as(app: &Router, pool: &PgPool, role: Role) -> String {
    let user = create_user(pool, role, "secret123").await;
    let (status, body) = send(
        app,
        Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"username": user.username, "password": "secret123"}).to_string(),
            ))
            .expect("login request"),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["resp_data"]["accessToken"]
        .as_str()
        .expect("access token")
        .to_string()
}

pub fn authed(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
}
