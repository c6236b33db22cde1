//! Local stand-in for the Khailingo backend
//!
//! Sessions are cookie based: `/login` hands out a stale session cookie and a
//! valid refresh cookie, `/auth/refresh` swaps the session cookie for a fresh
//! one, and `/me` only accepts the fresh session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Default)]
pub struct Counters {
    pub refresh: AtomicUsize,
    pub logout: AtomicUsize,
}

impl Counters {
    pub fn refresh_calls(&self) -> usize {
        self.refresh.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout.load(Ordering::SeqCst)
    }
}

pub struct TestBackend {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
}

impl TestBackend {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }
}

/// Starts the backend on a random local port
pub async fn start() -> TestBackend {
    let counters = Arc::new(Counters::default());

    let api = Router::new()
        .route("/login", get(login))
        .route("/me", get(me))
        .route("/admin/users", get(admin_users))
        .route("/echo", post(echo))
        .route("/search", get(search))
        .route("/broken", get(broken))
        .route("/slow", get(slow))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .with_state(counters.clone());
    let app = Router::new().nest("/api", api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestBackend { addr, counters }
}

fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

async fn login() -> Response {
    (
        AppendHeaders([
            (header::SET_COOKIE, "session=stale; Path=/"),
            (header::SET_COOKIE, "refresh=valid; Path=/"),
        ]),
        Json(json!({"ok": true})),
    )
        .into_response()
}

async fn me(headers: HeaderMap) -> Response {
    if cookie(&headers, "session") == Some("fresh") {
        Json(json!({"name": "Linh", "role": "student"})).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Unauthorized", "statusCode": 401})),
        )
            .into_response()
    }
}

async fn admin_users() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({"message": "Admins only", "statusCode": 403})),
    )
        .into_response()
}

async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    Json(json!({"body": body, "contentType": content_type}))
}

async fn search(RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({"query": query}))
}

async fn broken() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    Json(json!({"late": true}))
}

async fn refresh(State(counters): State<Arc<Counters>>, headers: HeaderMap) -> Response {
    counters.refresh.fetch_add(1, Ordering::SeqCst);

    if cookie(&headers, "refresh") == Some("valid") {
        (
            AppendHeaders([(header::SET_COOKIE, "session=fresh; Path=/")]),
            Json(json!({"ok": true})),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Refresh token missing"})),
        )
            .into_response()
    }
}

async fn logout(State(counters): State<Arc<Counters>>) -> Response {
    counters.logout.fetch_add(1, Ordering::SeqCst);
    (
        AppendHeaders([
            (header::SET_COOKIE, "session=; Path=/; Max-Age=0"),
            (header::SET_COOKIE, "refresh=; Path=/; Max-Age=0"),
        ]),
        StatusCode::NO_CONTENT,
    )
        .into_response()
}
