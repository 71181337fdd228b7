use crate::openai::{CallOutcome, Dispatcher};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

// A real implementation of the dispatcher backed by reqwest
pub struct HttpDispatcher {
    client: Client,
}

impl HttpDispatcher {
    pub fn new(connect_timeout: Duration) -> Result<Self, anyhow::Error> {
        // A 3xx must surface as an error, not be replayed as a GET
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| {
                anyhow::anyhow!("Failed to build HTTP client: {}", e)
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn send(
        &self,
        endpoint: &Url,
        body: &serde_json::Value,
        headers: &HeaderMap,
    ) -> CallOutcome {
        debug!("POST {}", endpoint);

        let response = match self
            .client
            .post(endpoint.clone())
            .headers(headers.clone())
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(endpoint = %endpoint, "AI request failed: {}", e);
                return CallOutcome::TransportFailure(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!(
                    endpoint = %endpoint,
                    status,
                    "Failed to read AI response body: {}",
                    e
                );
                return CallOutcome::TransportFailure(e.to_string());
            }
        };

        if status == 200 {
            CallOutcome::Success { status, body }
        } else {
            CallOutcome::StructuredError { status, body }
        }
    }
}
