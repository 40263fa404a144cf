#![allow(dead_code)]
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use time::macros::date;

use clinic_schedule_client::{
    auth::{MemorySessionStore, Session, SessionStore},
    clock::FixedClock,
    ApiClient, AppContext, Role,
};

/// "Today" for every integration test.
pub const TODAY: time::Date = date!(2025 - 07 - 01);

/// One request as the fake backend saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub request_id: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Default)]
struct Inner {
    requests: Vec<Recorded>,
    /// Keyed by "METHOD /path". The last scripted reply repeats.
    replies: HashMap<String, VecDeque<(StatusCode, serde_json::Value)>>,
}

/// Scripted stand-in for the clinic backend. Records every request and answers
/// from per-route reply queues.
#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<Inner>>,
}

impl FakeBackend {
    pub fn reply(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        let status = StatusCode::from_u16(status).unwrap();
        self.inner
            .lock()
            .unwrap()
            .replies
            .entry(format!("{} {}", method, path))
            .or_default()
            .push_back((status, body));
    }

    /// Shorthand for a 200 `{data: ...}` envelope.
    pub fn reply_data(&self, method: Method, path: &str, data: serde_json::Value) {
        self.reply(method, path, 200, serde_json::json!({ "data": data }));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    fn next_reply(&self, method: &Method, path: &str) -> (StatusCode, serde_json::Value) {
        let mut inner = self.inner.lock().unwrap();
        match inner.replies.get_mut(&format!("{} {}", method, path)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "message": format!("no reply scripted for {} {}", method, path) }),
            ),
        }
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn record(
    State(backend): State<FakeBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };

    backend.inner.lock().unwrap().requests.push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        authorization: header(&headers, "authorization"),
        content_type: header(&headers, "content-type"),
        request_id: header(&headers, "x-request-id"),
        body,
    });

    let (status, reply) = backend.next_reply(&method, &path);
    (status, Json(reply)).into_response()
}

/// Spin up the fake backend on a random port, returning its API base URL.
pub async fn setup_fake_backend() -> (String, FakeBackend) {
    let backend = FakeBackend::default();
    let app = Router::new().fallback(record).with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api", addr), backend)
}

/// Build a client whose session starts with `session`, returning its store too.
pub async fn client_with_session(
    base_url: &str,
    session: Option<(Role, &str)>,
) -> (ApiClient, Arc<MemorySessionStore>) {
    let store = Arc::new(MemorySessionStore::default());
    if let Some((role, token)) = session {
        store
            .save(&Session {
                token: Some(token.to_string()),
                role: Some(role),
            })
            .await
            .unwrap();
    }
    let ctx = AppContext::hydrate(store.clone(), &FixedClock(TODAY))
        .await
        .unwrap();
    let client = ApiClient::new(base_url, Duration::from_secs(5), ctx).unwrap();
    (client, store)
}

pub async fn admin_client(base_url: &str) -> ApiClient {
    client_with_session(base_url, Some((Role::Admin, "admin-token")))
        .await
        .0
}

pub fn bulk_ok(success: u32, skipped: u32) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "successCount": success,
        "skippedCount": skipped,
        "errorCount": 0,
        "conflicts": [],
        "createdDates": [],
        "message": "Schedule created",
    })
}
