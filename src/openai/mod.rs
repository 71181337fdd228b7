pub mod endpoint;
pub mod error;
pub mod fake;
pub mod normalize;
pub mod real;
pub mod request;
pub mod service;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use url::Url;

pub use error::AiError;

/// Constants for message roles
pub const ROLE_USER: &str = "user";

/// Sampling temperature sent with every request.
pub const DEFAULT_TEMPERATURE: f64 = 0.5;

/// The two request/response schemas an OpenAI-compatible backend may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiShape {
    /// `POST .../chat/completions` with a `messages` array.
    ChatCompletions,
    /// `POST .../responses` with a flat `input` string.
    Responses,
}

impl ApiShape {
    /// Path appended to the versioned base URL.
    pub fn path_suffix(self) -> &'static str {
        match self {
            ApiShape::ChatCompletions => "/chat/completions",
            ApiShape::Responses => "/responses",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApiShape::ChatCompletions => "chat_completions",
            ApiShape::Responses => "responses",
        }
    }
}

impl std::fmt::Display for ApiShape {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to issue one physical request.
///
/// Built once per attempt and handed to a [`Dispatcher`] exactly once.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub shape: ApiShape,
    pub endpoint: Url,
    pub model: Option<String>,
    pub prompt_text: String,
    pub temperature: f64,
}

/// Classified result of one HTTP round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success { status: u16, body: String },
    StructuredError { status: u16, body: String },
    TransportFailure(String),
}

/// Which extraction path produced [`NormalizedReply::text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    OutputText,
    OutputItems,
    ChatChoice,
    RawBody,
}

impl ReplySource {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplySource::OutputText => "output_text",
            ReplySource::OutputItems => "output_items",
            ReplySource::ChatChoice => "choices",
            ReplySource::RawBody => "raw_body",
        }
    }

    /// True for every path other than the one native to the shape requested.
    pub fn is_degraded(self, shape: ApiShape) -> bool {
        !matches!(
            (shape, self),
            (ApiShape::Responses, ReplySource::OutputText)
                | (ApiShape::ChatCompletions, ReplySource::ChatChoice)
        )
    }
}

/// Shape-independent result of a successful call.
///
/// Only `text` is returned to callers; the remaining fields are telemetry.
/// Token counts are -1 when the backend did not report them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReply {
    pub text: String,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub model_used: Option<String>,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub source: ReplySource,
}

/// A trait that abstracts the HTTP round trip so the retry logic can be
/// exercised without a network.
///
/// Implementations never retry on their own and never fail: every outcome,
/// including network errors, is reported as a [`CallOutcome`].
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send(
        &self,
        endpoint: &Url,
        body: &serde_json::Value,
        headers: &HeaderMap,
    ) -> CallOutcome;
}
