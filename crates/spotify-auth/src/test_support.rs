//! In-process stand-in for the accounts service and the `/v1/me` probe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use common::Secret;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::config::OAuthConfig;

pub(crate) struct MockState {
    pub token_calls: AtomicUsize,
    pub probe_calls: AtomicUsize,
    token_status: AtomicU16,
    token_body: Mutex<Value>,
    rejected_probe_status: AtomicU16,
    accepted_token: Mutex<Option<String>>,
    last_form: Mutex<HashMap<String, String>>,
    last_authorization: Mutex<Option<String>>,
}

pub(crate) struct MockSpotify {
    pub url: String,
    pub state: Arc<MockState>,
    _server: tokio::task::JoinHandle<()>,
}

impl MockSpotify {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            token_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
            token_status: AtomicU16::new(200),
            token_body: Mutex::new(json!({"access_token": "AT_NEW"})),
            rejected_probe_status: AtomicU16::new(401),
            accepted_token: Mutex::new(None),
            last_form: Mutex::new(HashMap::new()),
            last_authorization: Mutex::new(None),
        });

        let app = Router::new()
            .route("/api/token", post(token_handler))
            .route("/v1/me", get(me_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url,
            state,
            _server: server,
        }
    }

    pub fn config(&self) -> OAuthConfig {
        config_for(&self.url)
    }

    pub fn respond_to_token(&self, status: u16, body: Value) {
        self.state.token_status.store(status, Ordering::SeqCst);
        *self.state.token_body.lock().unwrap() = body;
    }

    /// `/v1/me` answers 200 for this bearer token and the rejection status otherwise.
    pub fn accept_token(&self, token: &str) {
        *self.state.accepted_token.lock().unwrap() = Some(token.to_string());
    }

    pub fn reject_probe_with(&self, status: u16) {
        self.state
            .rejected_probe_status
            .store(status, Ordering::SeqCst);
    }

    pub fn last_token_form(&self) -> HashMap<String, String> {
        self.state.last_form.lock().unwrap().clone()
    }

    pub fn last_token_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }
}

pub(crate) fn config_for(base_url: &str) -> OAuthConfig {
    OAuthConfig::new(
        "client-abc",
        Secret::new("client-secret".to_string()),
        "http://localhost:3000/callback",
    )
    .with_accounts_url(base_url)
    .with_api_url(base_url)
}

async fn token_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    *state.last_authorization.lock().unwrap() = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *state.last_form.lock().unwrap() = form;

    let status = StatusCode::from_u16(state.token_status.load(Ordering::SeqCst)).unwrap();
    let body = state.token_body.lock().unwrap().clone();
    (status, Json(body))
}

async fn me_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.probe_calls.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from);
    let accepted = state.accepted_token.lock().unwrap().clone();

    if accepted.is_some() && bearer == accepted {
        (StatusCode::OK, Json(json!({"id": "user-1"})))
    } else {
        let status =
            StatusCode::from_u16(state.rejected_probe_status.load(Ordering::SeqCst)).unwrap();
        (
            status,
            Json(json!({"error": {"status": status.as_u16(), "message": "The access token expired"}})),
        )
    }
}
