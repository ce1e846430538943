//! The mock service itself.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use rand::Rng;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::debug;

use super::mapping::{MockContent, MockMapping, MockResponse};
use crate::transport::{BoxFuture, ProgressSink, Response, Transport, TransportError};

const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy)]
struct Behavior {
    failure_probability: f64,
    min_latency: Duration,
    max_latency: Duration,
    chunk_size: usize,
}

#[derive(Debug, Default)]
struct Shared {
    mappings: RwLock<Vec<MockMapping>>,
    requests: DashMap<String, usize>,
}

/// In-process stand-in for a REST backend.
///
/// Clones share mappings and request counters. Builder methods configure the
/// clone they are called on.
#[derive(Debug, Clone)]
pub struct MockService {
    behavior: Behavior,
    shared: Arc<Shared>,
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockService {
    /// A service with no latency, no random failures and no mappings.
    pub fn new() -> Self {
        Self {
            behavior: Behavior {
                failure_probability: 0.0,
                min_latency: Duration::ZERO,
                max_latency: Duration::ZERO,
                chunk_size: DEFAULT_CHUNK_SIZE,
            },
            shared: Arc::new(Shared::default()),
        }
    }

    /// Probability in [0, 1] that any request fails regardless of mapping.
    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&probability),
            "failure probability out of range: {probability}"
        );
        self.behavior.failure_probability = probability;
        self
    }

    /// Uniform random latency in `[min, max]` before each answer.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        debug_assert!(min <= max, "latency bounds reversed: {min:?} > {max:?}");
        self.behavior.min_latency = min;
        self.behavior.max_latency = max;
        self
    }

    /// Body chunk size used for progress events when serving as a transport.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.behavior.chunk_size = chunk_size.max(1);
        self
    }

    pub fn failure_probability(&self) -> f64 {
        self.behavior.failure_probability
    }

    /// Add a mapping. Later mappings for the same route shadow earlier ones.
    pub fn register(&self, mapping: MockMapping) {
        debug!(method = mapping.method(), path = mapping.path(), "Mock mapping registered");
        self.shared.mappings.write().push(mapping);
    }

    /// Remove every mapping and reset the counters.
    pub fn reset(&self) {
        self.shared.mappings.write().clear();
        self.shared.requests.clear();
    }

    /// Requests seen for a path, mapped or not.
    pub fn request_count(&self, path: &str) -> usize {
        self.shared.requests.get(path).map(|c| *c).unwrap_or(0)
    }

    /// Requests seen across all paths.
    pub fn total_requests(&self) -> usize {
        self.shared.requests.iter().map(|entry| *entry.value()).sum()
    }

    /// Send a request and wait for the answer.
    ///
    /// `params` should be a JSON object; anything else counts as no params.
    pub async fn request(&self, method: &str, path: &str, params: Value) -> MockResponse {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let latency = self.sample_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.evaluate(method, path, &params)
    }

    /// Send a request in the background and hand `(success, content)` to the
    /// callback.
    pub fn call<F>(&self, method: &str, path: &str, params: Value, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(bool, MockContent) + Send + 'static,
    {
        let service = self.clone();
        let method = method.to_string();
        let path = path.to_string();
        tokio::spawn(async move {
            let response = service.request(&method, &path, params).await;
            callback(response.success, response.content);
        })
    }

    fn sample_latency(&self) -> Duration {
        let Behavior {
            min_latency,
            max_latency,
            ..
        } = self.behavior;
        if max_latency <= min_latency {
            return min_latency;
        }
        let min = min_latency.as_micros() as u64;
        let max = max_latency.as_micros() as u64;
        Duration::from_micros(rand::rng().random_range(min..=max))
    }

    fn roll_failure(&self) -> bool {
        let p = self.behavior.failure_probability;
        p > 0.0 && rand::rng().random::<f64>() < p
    }

    /// Decide the answer for one request. Random failure is rolled first.
    fn evaluate(&self, method: &str, path: &str, params: &Map<String, Value>) -> MockResponse {
        *self.shared.requests.entry(path.to_string()).or_insert(0) += 1;

        let mapping = self
            .shared
            .mappings
            .read()
            .iter()
            .rev()
            .find(|m| m.matches_route(method, path))
            .cloned();

        let response = match (mapping, self.roll_failure()) {
            (Some(mapping), true) => mapping.failure_response(),
            (None, true) => MockResponse {
                success: false,
                status: 500,
                content: MockContent::text("simulated failure"),
            },
            (Some(mapping), false) => mapping.respond(params),
            (None, false) => MockResponse {
                success: false,
                status: 404,
                content: MockContent::text("not found"),
            },
        };

        debug!(
            method,
            path,
            success = response.success,
            status = response.status,
            "Mock request answered"
        );
        response
    }
}

/// Query parameters as JSON, with scalars parsed where they look like JSON.
fn query_params(url: &reqwest::Url) -> Map<String, Value> {
    url.query_pairs()
        .map(|(key, value)| (key.into_owned(), parse_scalar(&value)))
        .collect()
}

fn parse_scalar(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_string()),
    }
}

impl Transport for MockService {
    fn get<'a>(
        &'a self,
        url: &'a str,
        _headers: &'a [(String, String)],
        progress: ProgressSink,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(async move {
            let parsed = reqwest::Url::parse(url).map_err(|e| TransportError::Network {
                url: url.to_string(),
                reason: format!("invalid URL: {}", e),
            })?;
            let params = query_params(&parsed);

            let answer = self.request("GET", parsed.path(), Value::Object(params)).await;
            let body = answer.content.body;
            let total = body.len() as u64;

            let mut sent = 0usize;
            loop {
                sent = (sent + self.behavior.chunk_size).min(body.len());
                progress(sent as u64, Some(total));
                if sent >= body.len() {
                    break;
                }
            }

            Ok(Response::new(answer.status, body)
                .with_header("Content-Type", answer.content.content_type))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn update_service() -> MockService {
        let service = MockService::new();
        service.register(
            MockMapping::new("POST", "/update")
                .with_preconditions(json!({"age": 17, "married": true}))
                .success(MockContent::json(&json!({"status": "updated"})))
                .failure(MockContent::json(&json!({"status": "rejected"}))),
        );
        service
    }

    #[tokio::test]
    async fn test_always_failing_service() {
        let service = update_service().with_failure_probability(1.0);

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for age in [17, 18, 30] {
            let outcomes = Arc::clone(&outcomes);
            handles.push(service.call("POST", "/update", json!({"age": age}), move |success, _| {
                outcomes.lock().push(success);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*outcomes.lock(), vec![false, false, false]);
    }

    #[tokio::test]
    async fn test_never_failing_service_follows_mappings() {
        let service = update_service().with_failure_probability(0.0);

        let rejected = service
            .request("POST", "/update", json!({"age": 17, "married": true}))
            .await;
        assert!(!rejected.success);
        assert_eq!(rejected.content.as_json(), Some(json!({"status": "rejected"})));

        let accepted = service
            .request("POST", "/update", json!({"age": 40, "married": true}))
            .await;
        assert!(accepted.success);
        assert_eq!(accepted.content.as_json(), Some(json!({"status": "updated"})));
    }

    #[tokio::test]
    async fn test_unmapped_path_is_not_found() {
        let service = MockService::new();
        let response = service.request("GET", "/nowhere", Value::Null).await;

        assert!(!response.success);
        assert_eq!(response.status, 404);
        assert_eq!(service.request_count("/nowhere"), 1);
    }

    #[tokio::test]
    async fn test_latency_is_applied() {
        let service = update_service()
            .with_latency(Duration::from_millis(30), Duration::from_millis(40));

        let start = std::time::Instant::now();
        service.request("POST", "/update", json!({})).await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_clones_share_mappings_and_counters() {
        let service = MockService::new();
        let clone = service.clone().with_failure_probability(1.0);
        clone.register(MockMapping::new("GET", "/a"));

        let response = service.evaluate("GET", "/a", &Map::new());
        assert!(response.success);
        assert_eq!(clone.request_count("/a"), 1);
        assert_eq!(service.failure_probability(), 0.0);
    }

    #[test]
    fn test_later_mapping_shadows_earlier() {
        let service = MockService::new();
        service.register(MockMapping::new("GET", "/a").success(MockContent::text("old")));
        service.register(MockMapping::new("GET", "/a").success(MockContent::text("new")));

        let response = service.evaluate("GET", "/a", &Map::new());
        assert_eq!(response.content.body.as_ref(), b"new");
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_scalar("17"), json!(17));
        assert_eq!(parse_scalar("true"), json!(true));
        assert_eq!(parse_scalar("1.5"), json!(1.5));
        assert_eq!(parse_scalar("bob"), json!("bob"));
        assert_eq!(parse_scalar("[1]"), json!("[1]"));
    }

    #[tokio::test]
    async fn test_transport_maps_query_to_params() {
        let service = update_service();
        service.register(
            MockMapping::new("GET", "/update")
                .with_preconditions(json!({"age": 17, "married": true}))
                .success(MockContent::text("ok"))
                .failure(MockContent::text("no")),
        );

        let sink: ProgressSink = Arc::new(|_, _| {});
        let failed = service
            .get("http://mock/update?age=17&married=true", &[], Arc::clone(&sink))
            .await
            .unwrap();
        assert_eq!(failed.status, 500);
        assert_eq!(failed.body.as_ref(), b"no");

        let ok = service
            .get("http://mock/update?age=17&married=false", &[], sink)
            .await
            .unwrap();
        assert_eq!(ok.status, 200);
        assert_eq!(ok.content_type(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_transport_reports_chunked_progress() {
        let service = MockService::new().with_chunk_size(10);
        service.register(MockMapping::new("GET", "/blob").success(MockContent::bytes(
            "application/octet-stream",
            vec![7u8; 25],
        )));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let sink: ProgressSink =
            Arc::new(move |bytes, total| seen_clone.lock().push((bytes, total)));

        let response = service.get("http://mock/blob", &[], sink).await.unwrap();

        assert_eq!(response.body.len(), 25);
        assert_eq!(
            *seen.lock(),
            vec![(10, Some(25)), (20, Some(25)), (25, Some(25))]
        );
    }
}
