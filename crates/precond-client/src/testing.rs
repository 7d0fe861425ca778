//! Test utilities for precond-client
//!
//! Provides an in-process owner API, a scriptable token exchange and a
//! delay that records instead of sleeping.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Json;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use precond_core::{Delay, PrecondError, PrimaryCredential, Result, TokenPair, VehicleState};

use crate::auth::TokenExchange;
use crate::OwnerApiClient;

/// A test server that automatically shuts down when dropped
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: OwnerApiClient,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `router` on a random local port
    ///
    /// # Example
    ///
    /// ```ignore
    /// use precond_client::testing::{MockOwnerApi, TestServer};
    ///
    /// let api = MockOwnerApi::new().with_vehicle("V1", "VIN1", VehicleState::Asleep);
    /// let server = TestServer::start(api.router()).await?;
    /// let response = server.client.send(&Endpoint::ListVehicles, "token", None).await?;
    /// ```
    pub async fn start(router: axum::Router) -> Result<Self> {
        Self::start_with_timeout(router, Duration::from_secs(5), Duration::from_secs(2)).await
    }

    /// Serve `router` with custom client timeouts
    pub async fn start_with_timeout(
        router: axum::Router,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| PrecondError::Transport(e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| PrecondError::Transport(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // Give server a moment to start
        tokio::time::sleep(Duration::from_millis(10)).await;

        let client =
            OwnerApiClient::with_config(&format!("http://{}", addr), timeout, connect_timeout)?;

        Ok(Self {
            addr,
            client,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Mock owner API
// =============================================================================

/// One request received by [`MockOwnerApi`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Raw `Authorization` header
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Bearer token the request was sent with
    pub fn bearer(&self) -> Option<&str> {
        self.authorization
            .as_deref()
            .and_then(|h| h.strip_prefix("Bearer "))
    }
}

#[derive(Default)]
struct MockState {
    vehicles: Vec<(String, String, VehicleState)>,
    scripted: HashMap<(String, String), VecDeque<(u16, Value)>>,
    requests: Vec<RecordedRequest>,
}

/// In-process owner API.
///
/// Known vehicles answer every endpoint with 200; unknown internal ids get
/// 404. Scripted responses for a method and path are served first, in order.
#[derive(Clone, Default)]
pub struct MockOwnerApi {
    state: Arc<Mutex<MockState>>,
}

impl MockOwnerApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vehicle to the account
    pub fn with_vehicle(self, id: &str, vin: &str, state: VehicleState) -> Self {
        self.state
            .lock()
            .vehicles
            .push((id.to_string(), vin.to_string(), state));
        self
    }

    /// Queue a response for `method path`
    pub fn respond(&self, method: &str, path: &str, status: u16, body: Value) -> &Self {
        self.state
            .lock()
            .scripted
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back((status, body));
        self
    }

    /// Queue the same response `times` times
    pub fn respond_times(&self, method: &str, path: &str, status: u16, times: usize) -> &Self {
        for _ in 0..times {
            self.respond(method, path, status, json!({"response": null}));
        }
        self
    }

    /// Replace the account's vehicles
    pub fn set_vehicles(&self, vehicles: &[(&str, &str, VehicleState)]) {
        self.state.lock().vehicles = vehicles
            .iter()
            .map(|(id, vin, state)| (id.to_string(), vin.to_string(), *state))
            .collect();
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Requests received for `method path`
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub fn router(&self) -> axum::Router {
        axum::Router::new()
            .fallback(handle_request)
            .with_state(self.clone())
    }

    fn default_response(&self, method: &Method, path: &str) -> (u16, Value) {
        let state = self.state.lock();

        if *method == Method::GET && path == "/api/1/vehicles" {
            let vehicles: Vec<Value> = state
                .vehicles
                .iter()
                .enumerate()
                .map(|(i, (id, vin, vehicle_state))| {
                    json!({
                        "id": i + 1,
                        "id_s": id,
                        "vin": vin,
                        "state": vehicle_state.to_string(),
                        "display_name": format!("Car {}", i + 1),
                    })
                })
                .collect();
            let count = vehicles.len();
            return (200, json!({"response": vehicles, "count": count}));
        }

        let Some(rest) = path.strip_prefix("/api/1/vehicles/") else {
            return (404, json!({"error": "not_found"}));
        };
        let id = rest.split('/').next().unwrap_or_default();
        let Some((_, _, vehicle_state)) = state.vehicles.iter().find(|(vid, _, _)| vid == id) else {
            return (404, json!({"response": null, "error": "not_found"}));
        };

        if rest.ends_with("/wake_up") {
            (200, json!({"response": {"id_s": id, "state": "online"}}))
        } else if rest.contains("/command/") {
            (200, json!({"response": {"result": true, "reason": ""}}))
        } else {
            (200, json!({"response": {"id_s": id, "state": vehicle_state.to_string()}}))
        }
    }
}

async fn handle_request(
    State(api): State<MockOwnerApi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri.path().trim_end_matches('/').to_string();
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice::<Value>(&body).ok();

    let scripted = {
        let mut state = api.state.lock();
        state.requests.push(RecordedRequest {
            method: method.to_string(),
            path: path.clone(),
            authorization,
            body,
        });
        state
            .scripted
            .get_mut(&(method.to_string(), path.clone()))
            .and_then(VecDeque::pop_front)
    };

    let (status, body) = match scripted {
        Some(response) => response,
        None => api.default_response(&method, &path),
    };

    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(body),
    )
}

// =============================================================================
// Delay and token exchange doubles
// =============================================================================

/// Delay that records requested durations and returns immediately
#[derive(Debug, Default)]
pub struct RecordingDelay {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durations requested so far, in order
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }

    pub fn total(&self) -> Duration {
        self.waits.lock().iter().sum()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().push(duration);
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Pair(TokenPair),
    Fail(String),
}

impl Scripted {
    fn result(&self) -> Result<TokenPair> {
        match self {
            Self::Pair(pair) => Ok(pair.clone()),
            Self::Fail(msg) => Err(PrecondError::RefreshFailed(msg.clone())),
        }
    }
}

/// Token exchange returning fixed results and counting calls.
///
/// Unconfigured grants are rejected with an empty pair.
#[derive(Debug, Default)]
pub struct MockTokenExchange {
    refresh: Option<Scripted>,
    login: Option<Scripted>,
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    last_refresh_token: Mutex<Option<String>>,
}

impl MockTokenExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_refresh(mut self, pair: TokenPair) -> Self {
        self.refresh = Some(Scripted::Pair(pair));
        self
    }

    pub fn failing_refresh(mut self, message: &str) -> Self {
        self.refresh = Some(Scripted::Fail(message.to_string()));
        self
    }

    pub fn on_login(mut self, pair: TokenPair) -> Self {
        self.login = Some(Scripted::Pair(pair));
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Refresh token presented by the most recent refresh call
    pub fn last_refresh_token(&self) -> Option<String> {
        self.last_refresh_token.lock().clone()
    }
}

#[async_trait]
impl TokenExchange for MockTokenExchange {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_token.lock() = Some(refresh_token.to_string());
        self.refresh
            .as_ref()
            .map_or(Ok(TokenPair::empty()), Scripted::result)
    }

    async fn login(&self, _credential: &PrimaryCredential) -> Result<TokenPair> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login
            .as_ref()
            .map_or(Ok(TokenPair::empty()), Scripted::result)
    }
}
