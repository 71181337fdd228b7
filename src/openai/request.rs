use crate::openai::{
    AiError, ApiShape, RequestSpec, DEFAULT_TEMPERATURE, ROLE_USER,
};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE,
};
use serde_json::{json, Value};
use url::Url;

/// Azure-style deployments read the key from this header instead of
/// `Authorization`.
pub const API_KEY_HEADER: &str = "api-key";

impl RequestSpec {
    pub fn new(
        shape: ApiShape,
        endpoint: &str,
        model: Option<&str>,
        prompt_text: &str,
    ) -> Result<Self, AiError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| AiError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            shape,
            endpoint,
            model: model.map(str::to_string),
            prompt_text: prompt_text.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// JSON body in the layout `self.shape` expects.
    pub fn body(&self) -> Value {
        let mut body = match self.shape {
            ApiShape::ChatCompletions => json!({
                "temperature": self.temperature,
                "messages": [{
                    "role": ROLE_USER,
                    "content": self.prompt_text,
                }]
            }),
            ApiShape::Responses => json!({
                "temperature": self.temperature,
                "input": self.prompt_text,
            }),
        };
        if let Some(model) = &self.model {
            body["model"] = Value::String(model.clone());
        }
        body
    }
}

/// Headers sent with every request, for either shape.
pub fn build_headers(api_key: &str) -> Result<HeaderMap, AiError> {
    let invalid = |_| {
        AiError::Settings(
            "API_KEY contains characters not allowed in an HTTP header"
                .to_string(),
        )
    };
    let key = HeaderValue::from_str(api_key).map_err(invalid)?;
    let bearer =
        HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(invalid)?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
    Ok(headers)
}
