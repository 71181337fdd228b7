use crate::openai::endpoint::{build_endpoint, resolve};
use crate::openai::normalize::normalize;
use crate::openai::request::build_headers;
use crate::openai::{
    AiError, ApiShape, CallOutcome, Dispatcher, NormalizedReply, RequestSpec,
};
use crate::settings::{AiSettings, SettingsProvider};
use crate::time_util;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Whether a rejected chat completions call failed because the model only
/// accepts the Responses API (e.g. `reasoning.summary unsupported_value`).
pub fn contains_reasoning_param_error(body: &str) -> bool {
    let body = body.to_lowercase();
    (body.contains("reasoning") && body.contains("unsupported_value"))
        || body.contains("reasoning.summary")
}

enum Attempt {
    Reply(NormalizedReply),
    Rejected { status: u16, body: String },
}

/// Sends prompts to the configured OpenAI-compatible backend.
///
/// Base URL, API key, and model are read from the settings provider on
/// every call. One logical call makes at most two HTTP requests: the
/// first attempt, plus a single retry against the Responses API when a chat
/// completions call is rejected with a reasoning-parameter error.
pub struct AiService {
    settings: Arc<dyn SettingsProvider>,
    dispatcher: Arc<dyn Dispatcher>,
    timezone: chrono_tz::Tz,
}

impl AiService {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        dispatcher: Arc<dyn Dispatcher>,
        timezone: chrono_tz::Tz,
    ) -> Self {
        Self {
            settings,
            dispatcher,
            timezone,
        }
    }

    /// Send `content` as a single user prompt and return the reply text.
    pub async fn send_request(&self, content: &str) -> Result<String, AiError> {
        Ok(self.send_request_detailed(content).await?.text)
    }

    #[instrument(skip(self, content), fields(content_len = content.len()), err)]
    pub async fn send_request_detailed(
        &self,
        content: &str,
    ) -> Result<NormalizedReply, AiError> {
        let settings = AiSettings::load(self.settings.as_ref())?;
        let headers = build_headers(&settings.api_key)?;
        let model = settings.model.as_deref();

        let (shape, endpoint) = resolve(&settings.base_url, model);
        let spec = RequestSpec::new(shape, &endpoint, model, content)?;

        let (status, body) = match self.attempt(&spec, &headers).await? {
            Attempt::Reply(reply) => return Ok(reply),
            Attempt::Rejected { status, body } => (status, body),
        };

        if shape != ApiShape::ChatCompletions
            || !contains_reasoning_param_error(&body)
        {
            return Err(AiError::Api {
                status,
                endpoint,
                body,
            });
        }

        let fallback_endpoint =
            build_endpoint(&settings.base_url, ApiShape::Responses);
        warn!(
            status,
            endpoint = %fallback_endpoint,
            "Model rejected chat completions parameters, \
             retrying once via the Responses API"
        );
        let retry = RequestSpec::new(
            ApiShape::Responses,
            &fallback_endpoint,
            model,
            content,
        )?;

        match self.attempt(&retry, &headers).await? {
            Attempt::Reply(reply) => Ok(reply),
            Attempt::Rejected { status, body } => Err(AiError::Api {
                status,
                endpoint: fallback_endpoint,
                body,
            }),
        }
    }

    /// One physical request: dispatch, then classify.
    async fn attempt(
        &self,
        spec: &RequestSpec,
        headers: &HeaderMap,
    ) -> Result<Attempt, AiError> {
        let outcome = self
            .dispatcher
            .send(&spec.endpoint, &spec.body(), headers)
            .await;

        match outcome {
            CallOutcome::Success { body, .. } => {
                let reply = normalize(spec.shape, &body).inspect_err(|e| {
                    error!(endpoint = %spec.endpoint, "{}", e);
                })?;
                self.log_reply(spec, &reply);
                Ok(Attempt::Reply(reply))
            }
            CallOutcome::StructuredError { status, body } => {
                error!(
                    status,
                    endpoint = %spec.endpoint,
                    body = %body,
                    "AI request failed"
                );
                Ok(Attempt::Rejected { status, body })
            }
            CallOutcome::TransportFailure(cause) => {
                error!(
                    endpoint = %spec.endpoint,
                    "AI request error: {}",
                    cause
                );
                Err(AiError::Transport {
                    endpoint: spec.endpoint.to_string(),
                    cause,
                })
            }
        }
    }

    fn log_reply(&self, spec: &RequestSpec, reply: &NormalizedReply) {
        info!(
            shape = %spec.shape,
            id = reply.request_id.as_deref().unwrap_or(""),
            time = %time_util::format_local(reply.created_at, self.timezone),
            model = reply.model_used.as_deref().unwrap_or(""),
            prompt_tokens = reply.prompt_tokens,
            completion_tokens = reply.completion_tokens,
            total_tokens = reply.total_tokens,
            source = reply.source.as_str(),
            "AI response"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::fake::FakeDispatcher;
    use crate::settings::{StaticSettings, API_KEY, BASE_URL, MODEL};
    use pretty_assertions::assert_eq;

    const REASONING_ERROR: &str = concat!(
        r#"{"error":{"message":"Unsupported value: 'reasoning.effort' "#,
        r#"does not support this model.","type":"invalid_request_error","#,
        r#""param":"reasoning","code":"unsupported_value"}}"#
    );

    fn settings(model: &str) -> Arc<StaticSettings> {
        Arc::new(
            StaticSettings::new()
                .with(BASE_URL, "https://api.example.com")
                .with(API_KEY, "sk-test")
                .with(MODEL, model),
        )
    }

    fn service(
        settings: Arc<StaticSettings>,
        dispatcher: Arc<FakeDispatcher>,
    ) -> AiService {
        AiService::new(settings, dispatcher, chrono_tz::UTC)
    }

    #[test]
    fn reasoning_error_signature() {
        assert!(contains_reasoning_param_error(REASONING_ERROR));
        assert!(contains_reasoning_param_error(
            "Unknown parameter: Reasoning.Summary"
        ));
        assert!(!contains_reasoning_param_error(
            r#"{"error":{"code":"unsupported_value","param":"temperature"}}"#
        ));
        assert!(!contains_reasoning_param_error("reasoning tokens exhausted"));
        assert!(!contains_reasoning_param_error(""));
    }

    #[tokio::test]
    async fn chat_model_uses_chat_completions() {
        let dispatcher = Arc::new(FakeDispatcher::new().with_success(
            r#"{"choices":[{"message":{"content":"hello"}}]}"#,
        ));
        let service = service(settings("gpt-4"), dispatcher.clone());

        let reply = service.send_request("hi").await.unwrap();
        assert_eq!(reply, "hello");

        let requests = dispatcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].endpoint,
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(requests[0].body["messages"][0]["content"], "hi");
        assert_eq!(requests[0].headers["authorization"], "Bearer sk-test");
        assert_eq!(requests[0].headers["api-key"], "sk-test");
    }

    #[tokio::test]
    async fn reasoning_model_uses_responses() {
        let dispatcher = Arc::new(
            FakeDispatcher::new().with_success(r#"{"output_text":"hi there"}"#),
        );
        let service = service(settings("o3-mini"), dispatcher.clone());

        assert_eq!(service.send_request("hi").await.unwrap(), "hi there");
        let requests = dispatcher.requests();
        assert_eq!(
            requests[0].endpoint,
            "https://api.example.com/v1/responses"
        );
        assert_eq!(requests[0].body["input"], "hi");
    }

    #[tokio::test]
    async fn reasoning_error_retries_once_via_responses() {
        let dispatcher = Arc::new(
            FakeDispatcher::new()
                .with_error(400, REASONING_ERROR)
                .with_success(r#"{"output_text":"retried"}"#),
        );
        let service = service(settings("gpt-5"), dispatcher.clone());

        assert_eq!(service.send_request("prompt").await.unwrap(), "retried");

        let requests = dispatcher.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].endpoint,
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            requests[1].endpoint,
            "https://api.example.com/v1/responses"
        );
        assert_eq!(requests[1].body["input"], "prompt");
        assert_eq!(requests[1].body["model"], "gpt-5");
        assert!(requests[1].body.get("messages").is_none());
    }

    #[tokio::test]
    async fn failed_retry_is_not_retried_again() {
        let dispatcher = Arc::new(
            FakeDispatcher::new()
                .with_error(400, REASONING_ERROR)
                .with_error(400, REASONING_ERROR)
                .with_success(r#"{"output_text":"never reached"}"#),
        );
        let service = service(settings("gpt-5"), dispatcher.clone());

        let err = service.send_request("prompt").await.unwrap_err();
        assert_eq!(
            err,
            AiError::Api {
                status: 400,
                endpoint: "https://api.example.com/v1/responses".to_string(),
                body: REASONING_ERROR.to_string(),
            }
        );
        assert_eq!(dispatcher.request_count(), 2);
    }

    #[tokio::test]
    async fn retry_transport_failure_is_returned() {
        let dispatcher = Arc::new(
            FakeDispatcher::new()
                .with_error(400, "reasoning.summary is not supported")
                .with_transport_failure("connection reset"),
        );
        let service = service(settings("gpt-5"), dispatcher.clone());

        let err = service.send_request("prompt").await.unwrap_err();
        assert!(matches!(err, AiError::Transport { .. }));
        assert_eq!(dispatcher.request_count(), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let dispatcher = Arc::new(
            FakeDispatcher::new()
                .with_error(401, r#"{"error":"invalid api key"}"#)
                .with_success(r#"{"output_text":"never reached"}"#),
        );
        let service = service(settings("gpt-4"), dispatcher.clone());

        let err = service.send_request("prompt").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.body(), Some(r#"{"error":"invalid api key"}"#));
        assert_eq!(dispatcher.request_count(), 1);
    }

    #[tokio::test]
    async fn responses_attempts_are_not_retried() {
        let dispatcher = Arc::new(
            FakeDispatcher::new()
                .with_error(400, REASONING_ERROR)
                .with_success(r#"{"output_text":"never reached"}"#),
        );
        let service = service(settings("o1"), dispatcher.clone());

        let err = service.send_request("prompt").await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(dispatcher.request_count(), 1);
    }

    #[tokio::test]
    async fn transport_failures_are_not_retried() {
        let dispatcher = Arc::new(
            FakeDispatcher::new()
                .with_transport_failure("dns error")
                .with_success("{}"),
        );
        let service = service(settings("gpt-4"), dispatcher.clone());

        let err = service.send_request("prompt").await.unwrap_err();
        assert_eq!(
            err,
            AiError::Transport {
                endpoint: "https://api.example.com/v1/chat/completions"
                    .to_string(),
                cause: "dns error".to_string(),
            }
        );
        assert_eq!(dispatcher.request_count(), 1);
    }

    #[tokio::test]
    async fn chat_parse_error_surfaces_raw_body() {
        let dispatcher =
            Arc::new(FakeDispatcher::new().with_success(r#"{"choices":[]}"#));
        let service = service(settings("gpt-4"), dispatcher.clone());

        let err = service.send_request("prompt").await.unwrap_err();
        assert!(matches!(err, AiError::Parse { .. }));
        assert_eq!(err.body(), Some(r#"{"choices":[]}"#));
    }

    #[tokio::test]
    async fn missing_settings_make_no_request() {
        let dispatcher = Arc::new(FakeDispatcher::new());
        let settings = Arc::new(StaticSettings::new().with(API_KEY, "sk"));
        let service = service(settings, dispatcher.clone());

        let err = service.send_request("prompt").await.unwrap_err();
        assert_eq!(err, AiError::MissingSetting(BASE_URL.to_string()));
        assert_eq!(dispatcher.request_count(), 0);
    }

    #[tokio::test]
    async fn settings_are_read_per_call() {
        let dispatcher = Arc::new(
            FakeDispatcher::new()
                .with_success(r#"{"choices":[{"message":{"content":"a"}}]}"#)
                .with_success(r#"{"output_text":"b"}"#),
        );
        let settings = settings("gpt-4");
        let service = service(settings.clone(), dispatcher.clone());

        assert_eq!(service.send_request("one").await.unwrap(), "a");
        settings.set(MODEL, "o4-mini");
        settings.set(BASE_URL, "https://proxy.example.com/v1/");
        assert_eq!(service.send_request("two").await.unwrap(), "b");

        let requests = dispatcher.requests();
        assert_eq!(
            requests[1].endpoint,
            "https://proxy.example.com/v1/responses"
        );
    }

    #[tokio::test]
    async fn detailed_reply_carries_telemetry() {
        let dispatcher = Arc::new(FakeDispatcher::new().with_success(
            r#"{"id":"chatcmpl-9","model":"gpt-4","created":1700000000,
                "choices":[{"message":{"content":"ok"}}],
                "usage":{"prompt_tokens":5,"completion_tokens":1,
                         "total_tokens":6}}"#,
        ));
        let service = service(settings("gpt-4"), dispatcher);

        let reply = service.send_request_detailed("prompt").await.unwrap();
        assert_eq!(reply.text, "ok");
        assert_eq!(reply.request_id.as_deref(), Some("chatcmpl-9"));
        assert_eq!(reply.total_tokens, 6);
    }
}
