//! Test helpers for delivery tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Default test timeout.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A request captured by the stub webhook.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Clone)]
struct StubState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    status: StatusCode,
    body: &'static str,
}

/// In-process webhook on `/webhook` that records every request and answers
/// with a fixed status.
pub struct StubWebhook {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubWebhook {
    /// Start a stub that answers every request with `status` and `body`.
    pub async fn start(status: u16, body: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = StubState {
            requests: Arc::clone(&requests),
            status: StatusCode::from_u16(status).unwrap(),
            body,
        };
        let router = Router::new()
            .route("/webhook", post(record))
            .with_state(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("stub webhook server failed");
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// URL of the webhook endpoint.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/webhook", self.addr.port())
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

impl Drop for StubWebhook {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, &'static str) {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    state.requests.lock().await.push(CapturedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers,
        body,
    });
    (state.status, state.body)
}

/// Build a string map from pairs.
pub fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Install a test subscriber so logs show up with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("teams_notify=debug")
        .try_init();
}
