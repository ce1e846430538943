//! Route mappings for the mock service.

use bytes::Bytes;
use serde_json::{Map, Value};

/// Canned response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockContent {
    pub content_type: String,
    pub body: Bytes,
}

impl MockContent {
    /// Arbitrary bytes with a content type.
    pub fn bytes(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// A JSON document.
    pub fn json(value: &Value) -> Self {
        Self::bytes("application/json", value.to_string().into_bytes())
    }

    /// Plain text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::bytes("text/plain", text.into().into_bytes())
    }

    /// Empty body.
    pub fn empty() -> Self {
        Self::bytes("text/plain", Bytes::new())
    }

    /// The body parsed as JSON, if it is JSON.
    pub fn as_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Outcome of one mock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub success: bool,
    pub status: u16,
    pub content: MockContent,
}

/// Canned behavior for one method and path.
///
/// A request whose parameters contain every precondition with an equal value
/// fails with the failure content; any other request succeeds with the
/// success content. A mapping without preconditions always succeeds.
#[derive(Debug, Clone)]
pub struct MockMapping {
    method: String,
    path: String,
    preconditions: Map<String, Value>,
    success: MockContent,
    failure: MockContent,
    success_status: u16,
    failure_status: u16,
}

impl MockMapping {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            preconditions: Map::new(),
            success: MockContent::empty(),
            failure: MockContent::empty(),
            success_status: 200,
            failure_status: 500,
        }
    }

    /// Add one precondition parameter.
    pub fn precondition(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.preconditions.insert(key.into(), value.into());
        self
    }

    /// Replace the preconditions with the fields of a JSON object.
    ///
    /// Non-object values clear the preconditions.
    pub fn with_preconditions(mut self, params: Value) -> Self {
        self.preconditions = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    pub fn success(mut self, content: MockContent) -> Self {
        self.success = content;
        self
    }

    pub fn failure(mut self, content: MockContent) -> Self {
        self.failure = content;
        self
    }

    pub fn with_success_status(mut self, status: u16) -> Self {
        self.success_status = status;
        self
    }

    pub fn with_failure_status(mut self, status: u16) -> Self {
        self.failure_status = status;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn matches_route(&self, method: &str, path: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.path == path
    }

    /// True if `params` holds every precondition with an equal value.
    ///
    /// Always false when there are no preconditions.
    pub(crate) fn preconditions_met(&self, params: &Map<String, Value>) -> bool {
        !self.preconditions.is_empty()
            && self
                .preconditions
                .iter()
                .all(|(key, expected)| params.get(key) == Some(expected))
    }

    pub(crate) fn failure_response(&self) -> MockResponse {
        MockResponse {
            success: false,
            status: self.failure_status,
            content: self.failure.clone(),
        }
    }

    pub(crate) fn success_response(&self) -> MockResponse {
        MockResponse {
            success: true,
            status: self.success_status,
            content: self.success.clone(),
        }
    }

    /// Answer a request that was not failed at random.
    pub(crate) fn respond(&self, params: &Map<String, Value>) -> MockResponse {
        if self.preconditions_met(params) {
            self.failure_response()
        } else {
            self.success_response()
        }
    }
}
