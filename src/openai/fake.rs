use crate::openai::{CallOutcome, Dispatcher};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::sync::Mutex;
use url::Url;

/// A request seen by [`FakeDispatcher`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub body: Value,
    pub headers: HeaderMap,
}

/// A fake dispatcher for testing
///
/// Returns scripted outcomes in order without touching the network, and
/// records every request so tests can assert on how many physical calls a
/// logical call made.
///
/// # Example
///
/// ```
/// use ai_relay::openai::fake::FakeDispatcher;
/// use ai_relay::openai::{CallOutcome, Dispatcher};
/// use reqwest::header::HeaderMap;
///
/// #[tokio::main]
/// async fn main() {
///     let dispatcher = FakeDispatcher::new()
///         .with_success(r#"{"output_text":"hi"}"#);
///
///     let endpoint = "https://api.example.com/v1/responses".parse().unwrap();
///     let body = serde_json::json!({"input": "hello"});
///     let outcome =
///         dispatcher.send(&endpoint, &body, &HeaderMap::new()).await;
///
///     assert!(matches!(outcome, CallOutcome::Success { .. }));
///     assert_eq!(dispatcher.request_count(), 1);
/// }
/// ```
pub struct FakeDispatcher {
    outcomes: Mutex<Vec<CallOutcome>>,
    // Track requests for verification in tests
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl Default for FakeDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDispatcher {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
        }
    }

    /// Queue an arbitrary outcome
    pub fn with_outcome(self, outcome: CallOutcome) -> Self {
        self.outcomes.lock().unwrap().push(outcome);
        self
    }

    /// Queue a 200 response with the given body
    pub fn with_success(self, body: &str) -> Self {
        self.with_outcome(CallOutcome::Success {
            status: 200,
            body: body.to_string(),
        })
    }

    /// Queue a non-200 response
    pub fn with_error(self, status: u16, body: &str) -> Self {
        self.with_outcome(CallOutcome::StructuredError {
            status,
            body: body.to_string(),
        })
    }

    /// Queue a network failure
    pub fn with_transport_failure(self, cause: &str) -> Self {
        self.with_outcome(CallOutcome::TransportFailure(cause.to_string()))
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for FakeDispatcher {
    async fn send(
        &self,
        endpoint: &Url,
        body: &Value,
        headers: &HeaderMap,
    ) -> CallOutcome {
        self.requests.lock().unwrap().push(RecordedRequest {
            endpoint: endpoint.to_string(),
            body: body.clone(),
            headers: headers.clone(),
        });

        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            CallOutcome::TransportFailure(
                "FakeDispatcher has no scripted outcome left".to_string(),
            )
        } else {
            outcomes.remove(0)
        }
    }
}
