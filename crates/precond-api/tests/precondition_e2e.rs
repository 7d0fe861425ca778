//! E2E tests for the preconditioning endpoint
//!
//! Two in-process servers: a mock owner API and the real router pointed at
//! it. Requests go through plain reqwest, the way a phone shortcut would
//! call the endpoint.

use std::sync::Arc;

use precond_api::{create_router, AppState};
use precond_client::testing::{MockOwnerApi, MockTokenExchange, RecordingDelay, TestServer};
use precond_client::{RetryConfig, TokenManager};
use precond_core::{keys, MemoryTokenStore, TokenPair, TokenStore, VehicleState};
use serde_json::{json, Value};

const VIN: &str = "5YJ3E1EA7KF000001";
const SEAT_PATH: &str = "/api/1/vehicles/V1/command/remote_seat_heater_request";

struct Deployment {
    api: MockOwnerApi,
    _owner_api: TestServer,
    service: TestServer,
    http: reqwest::Client,
}

impl Deployment {
    async fn start(api: MockOwnerApi) -> Self {
        Self::start_with(api, |state| state).await
    }

    async fn start_with(api: MockOwnerApi, configure: impl FnOnce(AppState) -> AppState) -> Self {
        let owner_api = TestServer::start(api.router()).await.unwrap();
        let state = AppState::new(owner_api.client.clone(), &RetryConfig::default())
            .with_delay(Arc::new(RecordingDelay::new()));
        let service = TestServer::start(create_router(configure(state)))
            .await
            .unwrap();

        Self {
            api,
            _owner_api: owner_api,
            service,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.service.base_url(), path)
    }

    async fn post(&self, headers: &[(&str, &str)]) -> (u16, Value) {
        let mut request = self.http.post(self.url("/"));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(content_type.starts_with("application/json"), "{}", content_type);
        (status, response.json().await.unwrap())
    }
}

fn account() -> MockOwnerApi {
    MockOwnerApi::new().with_vehicle("V1", VIN, VehicleState::Asleep)
}

#[tokio::test]
async fn test_precondition_with_temperature_and_seats() {
    let deployment = Deployment::start(account()).await;

    let (status, body) = deployment
        .post(&[
            ("X-Tesla-access_token", "caller-token"),
            ("X-Tesla-vin", VIN),
            ("X-Tesla-temp", "21"),
            ("X-Tesla-seats", "3,,3"),
        ])
        .await;

    assert_eq!(status, 200);
    let message = body["response"].as_str().unwrap();
    assert!(message.contains("preconditioning to 21C"), "{}", message);
    assert!(message.contains(", and the seats have been set."), "{}", message);

    let api = &deployment.api;
    assert_eq!(
        api.count("POST", "/api/1/vehicles/V1/command/auto_conditioning_start"),
        1
    );

    let temps = api.requests_to("POST", "/api/1/vehicles/V1/command/set_temps");
    assert_eq!(temps.len(), 1);
    assert_eq!(
        temps[0].body,
        Some(json!({"driver_temp": 21.0, "passenger_temp": 21.0}))
    );

    let mut seats: Vec<Value> = api
        .requests_to("POST", SEAT_PATH)
        .into_iter()
        .filter_map(|r| r.body)
        .collect();
    seats.sort_by_key(|b| b["heater"].as_u64());
    assert_eq!(
        seats,
        vec![
            json!({"heater": 0, "level": 3}),
            json!({"heater": 2, "level": 3}),
        ]
    );

    assert!(api
        .requests()
        .iter()
        .all(|r| r.bearer() == Some("caller-token")));
}

#[tokio::test]
async fn test_unknown_vin() {
    let deployment = Deployment::start(account()).await;

    let (status, body) = deployment
        .post(&[
            ("X-Tesla-access_token", "caller-token"),
            ("X-Tesla-vin", "UNKNOWNVIN0000000"),
        ])
        .await;

    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({"response": "Error: Cannot find vehicle with that VIN"})
    );
}

#[tokio::test]
async fn test_missing_credentials() {
    let deployment = Deployment::start(account()).await;

    let (status, body) = deployment.post(&[("X-Tesla-vin", VIN)]).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"response": "Error: No access token provided"}));
    assert!(deployment.api.requests().is_empty());
}

#[tokio::test]
async fn test_invalid_seat_level_is_rejected_before_any_request() {
    let deployment = Deployment::start(account()).await;

    let (_, body) = deployment
        .post(&[
            ("X-Tesla-access_token", "caller-token"),
            ("X-Tesla-vin", VIN),
            ("X-Tesla-seats", "9"),
        ])
        .await;
    assert_eq!(body, json!({"response": "Error: Invalid seat heater level: 9"}));
    assert!(deployment.api.requests().is_empty());
}

#[tokio::test]
async fn test_query_parameters_with_get() {
    let deployment = Deployment::start(account()).await;

    let response = deployment
        .http
        .get(deployment.url("/"))
        .query(&[("access_token", "caller-token"), ("vin", VIN)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"response": "Car is preconditioning"}));
}

#[tokio::test]
async fn test_malformed_query_string_still_answers_with_json() {
    let deployment = Deployment::start(account()).await;

    let response = deployment
        .http
        .get(format!(
            "{}?access_token=caller-token&vin={}&vin={}",
            deployment.url("/"),
            VIN,
            VIN
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    let message = body["response"].as_str().unwrap();
    assert!(message.starts_with("Error: "), "{}", message);
    assert!(message.contains("query string"), "{}", message);
    assert!(deployment.api.requests().is_empty());
}

#[tokio::test]
async fn test_too_many_seats_is_rejected() {
    let deployment = Deployment::start(account()).await;

    let (status, body) = deployment
        .post(&[
            ("X-Tesla-access_token", "caller-token"),
            ("X-Tesla-vin", VIN),
            ("X-Tesla-seats", vec!["1"; 300].join(",").as_str()),
        ])
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"response": "Error: Too many seats: 300"}));
    assert!(deployment.api.requests().is_empty());
}

#[tokio::test]
async fn test_shared_secret_uses_stored_credentials() {
    let store = Arc::new(MemoryTokenStore::with_entries([(keys::REFRESH_TOKEN, "r0")]));
    let exchange = Arc::new(MockTokenExchange::new().on_refresh(TokenPair::new("a1", "r1")));
    let tokens = Arc::new(TokenManager::new(store.clone(), Some(exchange.clone())));

    let deployment = Deployment::start_with(account(), move |state| {
        state.with_account("s3cret", tokens)
    })
    .await;

    let (_, body) = deployment
        .post(&[("X-Tesla-token", "s3cret"), ("X-Tesla-vin", VIN)])
        .await;
    assert_eq!(body, json!({"response": "Car is preconditioning"}));
    assert_eq!(exchange.refresh_calls(), 1);
    assert_eq!(
        store.get(&keys::vehicle_id(VIN)).await.unwrap().as_deref(),
        Some("V1")
    );

    let (_, body) = deployment
        .post(&[("X-Tesla-token", "wrong"), ("X-Tesla-vin", VIN)])
        .await;
    assert_eq!(body, json!({"response": "Error: Invalid access token"}));
}

#[tokio::test]
async fn test_health() {
    let deployment = Deployment::start(account()).await;

    let response = deployment
        .http
        .get(deployment.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "OK");
}
