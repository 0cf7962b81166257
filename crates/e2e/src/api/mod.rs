//! Object API client with a rate-limit fallback
//!
//! Calls go to the real `/objects` endpoints until a response is recognized
//! as rate limited (HTTP 405 with an `error` mentioning "limit"). From then on
//! the context is [`ApiMode::Limited`] for the rest of the run: creates are
//! synthesized into the [`MockStore`], and reads and writes of ids the store
//! knows are answered locally. Ids the store does not know still go to the
//! real API.

pub mod mock;
pub mod values;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::{assertion, E2eResult};

pub use mock::{Lookup, MockObject, MockStore};

static LIMIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)limit").unwrap());

/// Request timeout for every real call
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A real or synthesized response, as assertion steps see it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    /// Round trip time; `None` for synthesized responses
    pub duration_ms: Option<u64>,
    pub mocked: bool,
}

impl ApiResponse {
    pub fn synthetic(status: u16, body: Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status,
            body,
            headers,
            duration_ms: None,
            mocked: true,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 405 with an `error` string mentioning "limit"
    pub fn is_rate_limited(&self) -> bool {
        self.status == 405
            && self
                .body
                .get("error")
                .and_then(Value::as_str)
                .map(|e| LIMIT.is_match(e))
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    #[default]
    Normal,
    /// Sticky for the rest of the run
    Limited,
}

/// How a real non-2xx response is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Non-2xx fails the step
    Strict,
    /// Any status is recorded; a rate-limited answer becomes a 404
    Lenient,
}

#[derive(Debug, Default)]
struct FallbackState {
    mode: ApiMode,
    store: MockStore,
}

/// Rate-limit state and mock store shared by every scenario of a run
#[derive(Debug)]
pub struct ApiFallbackContext {
    http: reqwest::Client,
    state: Mutex<FallbackState>,
}

impl ApiFallbackContext {
    pub fn new() -> E2eResult<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            state: Mutex::new(FallbackState::default()),
        }
    }

    pub fn mode(&self) -> ApiMode {
        self.state.lock().mode
    }

    pub fn is_limited(&self) -> bool {
        self.mode() == ApiMode::Limited
    }

    pub fn mock_count(&self) -> usize {
        self.state.lock().store.len()
    }

    fn mark_limited(&self) {
        let mut state = self.state.lock();
        if state.mode == ApiMode::Normal {
            info!("Object API is rate limiting; answering from the in-process mock store from now on");
            state.mode = ApiMode::Limited;
        }
    }

    /// Answers from the store when limited and the id is known.
    fn answer_locally(
        &self,
        id: &str,
        not_found: Value,
        op: impl FnOnce(&mut MockStore) -> Lookup,
        live: impl FnOnce(MockObject) -> ApiResponse,
    ) -> Option<ApiResponse> {
        let mut state = self.state.lock();
        if state.mode != ApiMode::Limited || !state.store.contains(id) {
            return None;
        }
        debug!("Answering {} from the mock store", id);
        match op(&mut state.store) {
            Lookup::Live(object) => Some(live(object)),
            Lookup::Deleted => Some(ApiResponse::synthetic(404, not_found)),
            Lookup::Unknown => None,
        }
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> E2eResult<ApiResponse> {
        debug!("{} {}", method, url);
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let start = Instant::now();
        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let bytes = response.bytes().await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(ApiResponse {
            status,
            body,
            headers,
            duration_ms: Some(duration_ms),
            mocked: false,
        })
    }

    /// Applies the failure policy to a real response.
    fn settle_real(
        &self,
        what: &str,
        response: ApiResponse,
        policy: FailurePolicy,
        rate_limited_body: Value,
    ) -> E2eResult<ApiResponse> {
        if response.is_rate_limited() {
            self.mark_limited();
            if policy == FailurePolicy::Lenient {
                return Ok(ApiResponse::synthetic(404, rate_limited_body));
            }
        }
        if policy == FailurePolicy::Strict && !response.is_success() {
            return Err(assertion(format!(
                "{what} returned {}: {}",
                response.status, response.body
            )));
        }
        Ok(response)
    }

    /// POST `/objects`; expects 200 or 201 unless the call is mocked.
    pub async fn create(&self, base: &str, name: &str, data: Map<String, Value>) -> E2eResult<ApiResponse> {
        if self.is_limited() {
            return Ok(self.create_mock(name, data));
        }

        let body = json!({ "name": name, "data": data });
        let response = self
            .send(Method::POST, &format!("{base}/objects"), Some(&body))
            .await?;

        if response.is_rate_limited() {
            self.mark_limited();
            return Ok(self.create_mock(name, data));
        }
        if !matches!(response.status, 200 | 201) {
            return Err(assertion(format!(
                "create object returned {}, expected 200 or 201: {}",
                response.status, response.body
            )));
        }
        Ok(response)
    }

    fn create_mock(&self, name: &str, data: Map<String, Value>) -> ApiResponse {
        let object = self.state.lock().store.create(name, data);
        debug!("Created mock object {}", object.id);
        ApiResponse::synthetic(201, object_body(&object))
    }

    /// GET `/objects/{id}`
    pub async fn get(&self, base: &str, id: &str, policy: FailurePolicy) -> E2eResult<ApiResponse> {
        if let Some(local) = self.answer_locally(
            id,
            json!({ "message": "Not found" }),
            |store| store.get(id),
            |object| ApiResponse::synthetic(200, object_body(&object)),
        ) {
            return Ok(local);
        }

        let response = self
            .send(Method::GET, &format!("{base}/objects/{id}"), None)
            .await?;
        self.settle_real(
            "get object",
            response,
            policy,
            json!({ "message": "Not found (rate-limited)" }),
        )
    }

    /// PUT `/objects/{id}` with a new name
    pub async fn update_name(
        &self,
        base: &str,
        id: &str,
        name: &str,
        policy: FailurePolicy,
    ) -> E2eResult<ApiResponse> {
        if let Some(local) = self.answer_locally(
            id,
            json!({}),
            |store| store.rename(id, name),
            |object| ApiResponse::synthetic(200, object_body(&object)),
        ) {
            return Ok(local);
        }

        let body = json!({ "name": name });
        let response = self
            .send(Method::PUT, &format!("{base}/objects/{id}"), Some(&body))
            .await?;
        self.settle_real("update object", response, policy, json!({}))
    }

    /// PATCH `/objects/{id}` merging `delta` into `data`
    pub async fn patch(
        &self,
        base: &str,
        id: &str,
        delta: Map<String, Value>,
        policy: FailurePolicy,
    ) -> E2eResult<ApiResponse> {
        let body = json!({ "data": delta });
        if let Some(local) = self.answer_locally(
            id,
            json!({}),
            |store| store.merge_data(id, delta),
            |object| ApiResponse::synthetic(200, object_body(&object)),
        ) {
            return Ok(local);
        }

        let response = self
            .send(Method::PATCH, &format!("{base}/objects/{id}"), Some(&body))
            .await?;
        self.settle_real("patch object", response, policy, json!({}))
    }

    /// DELETE `/objects/{id}`; mocked deletes are soft
    pub async fn delete(&self, base: &str, id: &str, policy: FailurePolicy) -> E2eResult<ApiResponse> {
        if let Some(local) = self.answer_locally(
            id,
            json!({}),
            |store| store.delete(id),
            |_| ApiResponse::synthetic(200, json!({ "deleted": true })),
        ) {
            return Ok(local);
        }

        let response = self
            .send(Method::DELETE, &format!("{base}/objects/{id}"), None)
            .await?;
        self.settle_real("delete object", response, policy, json!({}))
    }

    /// GET `/objects`; a rate-limited list is answered with a small fixed array.
    pub async fn list(&self, base: &str) -> E2eResult<ApiResponse> {
        if self.is_limited() {
            return Ok(placeholder_list());
        }

        let response = self.send(Method::GET, &format!("{base}/objects"), None).await?;
        if response.is_rate_limited() {
            self.mark_limited();
            return Ok(placeholder_list());
        }
        Ok(response)
    }

    /// GET `/objects/{id}` for seeded objects; rate limiting synthesizes a
    /// minimal object carrying the requested id.
    pub async fn get_mock(&self, base: &str, id: &str) -> E2eResult<ApiResponse> {
        if let Some(local) = self.answer_locally(
            id,
            json!({ "message": "Not found" }),
            |store| store.get(id),
            |object| ApiResponse::synthetic(200, object_body(&object)),
        ) {
            return Ok(local);
        }

        let response = self
            .send(Method::GET, &format!("{base}/objects/{id}"), None)
            .await?;
        if response.is_rate_limited() {
            self.mark_limited();
            return Ok(ApiResponse::synthetic(
                200,
                json!({ "id": id, "name": "Mock Object", "data": {} }),
            ));
        }
        Ok(response)
    }
}

fn object_body(object: &MockObject) -> Value {
    json!({ "id": object.id, "name": object.name, "data": object.data })
}

fn placeholder_list() -> ApiResponse {
    ApiResponse::synthetic(200, json!([{ "id": "1" }, { "id": "2" }, { "id": "3" }]))
}
