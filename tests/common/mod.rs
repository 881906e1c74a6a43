//! In-process mock of the portal REST API
//!
//! Accepts the login `alice@example.com` / `correct-horse`, issues JWT access
//! tokens and opaque refresh tokens, and counts calls per endpoint so tests
//! can assert how many requests the client made.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use portal_session::auth::{AccessClaims, MemoryTokenStore, TokenStore};
use portal_session::{Config, SessionManager};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const EMAIL: &str = "alice@example.com";
pub const PASSWORD: &str = "correct-horse";
pub const RESET_TOKEN: &str = "good-reset-token";

#[derive(Default)]
pub struct BackendState {
    pub requests: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub ticket_calls: AtomicUsize,
    /// Every ticket request answers 401, whatever the token
    pub tickets_always_unauthorized: AtomicBool,
    /// The refresh endpoint refuses every token
    pub refresh_rejects: AtomicBool,
    /// The refresh endpoint hands out a new refresh token each time
    pub rotate_refresh_tokens: AtomicBool,
    /// Milliseconds the refresh endpoint waits before answering
    pub refresh_delay_ms: AtomicU64,
    access_tokens: Mutex<HashSet<String>>,
    refresh_tokens: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

impl BackendState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Make every access token issued so far invalid, as if it expired
    pub fn expire_access_tokens(&self) {
        self.access_tokens.lock().unwrap().clear();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.refresh_tokens.lock().unwrap().clear();
    }

    pub fn accepts_access(&self, token: &str) -> bool {
        self.access_tokens.lock().unwrap().contains(token)
    }

    pub fn issue_access(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let now = chrono::Utc::now().timestamp();
        let claims = AccessClaims {
            sub: Some("u-1".to_string()),
            iat: Some(now + n as i64),
            exp: Some(now + 900 + n as i64),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"mock-backend-secret"),
        )
        .expect("Failed to create token");
        self.access_tokens.lock().unwrap().insert(token.clone());
        token
    }

    pub fn issue_refresh(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let token = format!("refresh-{}", n);
        self.refresh_tokens.lock().unwrap().insert(token.clone());
        token
    }

    fn bearer_ok(&self, headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| self.accepts_access(token))
    }
}

pub fn alice() -> Value {
    json!({
        "id": "u-1",
        "username": "alice",
        "email": EMAIL,
        "role": "agent",
        "avatarUrl": "/avatars/alice.png",
        "office": "Downtown"
    })
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/api/users/login", post(login))
            .route("/api/users/register", post(register))
            .route("/api/users/forgot-password", post(forgot_password))
            .route("/api/users/reset-password", post(reset_password))
            .route("/api/users/refresh-token", post(refresh_token))
            .route("/api/users/profile", get(profile))
            .route("/api/tickets", get(list_tickets).post(create_ticket))
            .route("/api/broken", get(broken))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.api.base_url = format!("http://{}", self.addr);
        config.api.timeout_secs = 5;
        config
    }

    /// Session manager backed by in-memory token storage
    pub fn manager(&self) -> (SessionManager, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(&self.config(), store.clone()).unwrap();
        (manager, store)
    }

    pub fn manager_with_store(&self, store: Arc<dyn TokenStore>) -> SessionManager {
        SessionManager::new(&self.config(), store).unwrap()
    }

    pub fn requests(&self) -> usize {
        BackendState::count(&self.state.requests)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn reject(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": false, "message": message })))
}

async fn login(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    state.login_calls.fetch_add(1, Ordering::SeqCst);

    if body["email"] == EMAIL && body["password"] == PASSWORD {
        (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "user": alice(),
                "accessToken": state.issue_access(),
                "refreshToken": state.issue_refresh(),
            })),
        )
    } else {
        reject(StatusCode::UNAUTHORIZED, "Invalid email or password")
    }
}

async fn register(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);

    if body["email"] == "taken@example.com" {
        return reject(StatusCode::CONFLICT, "Email already registered");
    }

    let user = json!({
        "id": "u-2",
        "username": body["username"],
        "email": body["email"],
        "role": "client",
        "firstName": body["firstName"],
    });
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": user,
            "accessToken": state.issue_access(),
            "refreshToken": state.issue_refresh(),
        })),
    )
}

async fn forgot_password(
    State(state): State<Arc<BackendState>>,
    Json(_body): Json<Value>,
) -> Json<Value> {
    state.requests.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "success": true, "message": "Reset instructions sent" }))
}

async fn reset_password(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.requests.fetch_add(1, Ordering::SeqCst);

    if body["token"] == RESET_TOKEN {
        Json(json!({ "success": true, "message": "Password updated" }))
    } else {
        // Refusal on HTTP 200, only the envelope says so.
        Json(json!({ "success": false, "message": "Reset link is invalid or expired" }))
    }
}

async fn refresh_token(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let known = state.refresh_tokens.lock().unwrap().contains(&presented);
    if state.refresh_rejects.load(Ordering::SeqCst) || !known {
        return reject(StatusCode::UNAUTHORIZED, "Refresh token revoked");
    }

    let mut answer = json!({ "success": true, "accessToken": state.issue_access() });
    if state.rotate_refresh_tokens.load(Ordering::SeqCst) {
        state.refresh_tokens.lock().unwrap().remove(&presented);
        answer["refreshToken"] = Value::from(state.issue_refresh());
    }
    (StatusCode::OK, Json(answer))
}

async fn profile(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    state.profile_calls.fetch_add(1, Ordering::SeqCst);

    if state.bearer_ok(&headers) {
        (StatusCode::OK, Json(json!({ "success": true, "user": alice() })))
    } else {
        reject(StatusCode::UNAUTHORIZED, "Token expired")
    }
}

async fn list_tickets(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    state.ticket_calls.fetch_add(1, Ordering::SeqCst);

    if state.tickets_always_unauthorized.load(Ordering::SeqCst) || !state.bearer_ok(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Token expired");
    }
    (
        StatusCode::OK,
        Json(json!([
            { "id": 1, "title": "Broken heater", "status": "open" },
            { "id": 2, "title": "Visa renewal", "status": "pending" }
        ])),
    )
}

async fn create_ticket(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    state.ticket_calls.fetch_add(1, Ordering::SeqCst);

    if !state.bearer_ok(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Token expired");
    }
    (
        StatusCode::CREATED,
        Json(json!({ "id": 3, "title": body["title"], "status": "open" })),
    )
}

async fn broken(State(state): State<Arc<BackendState>>) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    reject(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable")
}
