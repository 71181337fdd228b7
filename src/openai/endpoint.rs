use crate::openai::ApiShape;

/// Lower-case fragments of model names that only accept the Responses API.
///
/// This is a heuristic allow-list, not a classifier: a model that needs the
/// Responses API but is missing here is caught by the fallback retry in
/// [`crate::openai::service`].
pub const RESPONSES_MODEL_MARKERS: &[&str] =
    &["o1", "o3", "o4", "4.1", "reasoner", "4o-mini", "gpt-4o-mini"];

/// Whether `model` should be sent to the Responses API.
pub fn is_responses_model(model: Option<&str>) -> bool {
    let Some(model) = model else {
        return false;
    };
    let model = model.to_lowercase();
    RESPONSES_MODEL_MARKERS
        .iter()
        .any(|marker| model.contains(marker))
}

/// Trim whitespace and drop one trailing slash.
pub fn normalize_base_url(base_url: &str) -> &str {
    let trimmed = base_url.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed)
}

/// Full URL for `shape` under `base_url`, inserting `/v1` only when the
/// base does not already carry it.
pub fn build_endpoint(base_url: &str, shape: ApiShape) -> String {
    let base = normalize_base_url(base_url);
    if base.ends_with("/v1") || base.contains("/v1/") {
        format!("{}{}", base, shape.path_suffix())
    } else {
        format!("{}/v1{}", base, shape.path_suffix())
    }
}

/// Pick the API shape for `model` and the endpoint that serves it.
pub fn resolve(base_url: &str, model: Option<&str>) -> (ApiShape, String) {
    let shape = if is_responses_model(model) {
        ApiShape::Responses
    } else {
        ApiShape::ChatCompletions
    };
    (shape, build_endpoint(base_url, shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reasoning_models_use_responses() {
        for model in [
            "o1-preview",
            "o3",
            "O4-mini",
            "gpt-4.1",
            "deepseek-reasoner",
            "gpt-4o-mini",
            "GPT-4O-MINI-2024",
        ] {
            let (shape, endpoint) =
                resolve("https://api.example.com", Some(model));
            assert_eq!(shape, ApiShape::Responses, "model {}", model);
            assert!(endpoint.ends_with("/responses"), "model {}", model);
        }
    }

    #[test]
    fn other_models_use_chat_completions() {
        for model in ["gpt-4", "gpt-3.5-turbo", "qwen-plus", "deepseek-chat"] {
            let (shape, endpoint) =
                resolve("https://api.example.com", Some(model));
            assert_eq!(shape, ApiShape::ChatCompletions, "model {}", model);
            assert!(endpoint.ends_with("/chat/completions"), "model {}", model);
        }
    }

    #[test]
    fn missing_model_uses_chat_completions() {
        let (shape, _) = resolve("https://api.example.com", None);
        assert_eq!(shape, ApiShape::ChatCompletions);
    }

    #[test]
    fn version_segment_is_not_duplicated() {
        assert_eq!(
            resolve("https://api.example.com/v1", Some("gpt-4")).1,
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            resolve("https://api.example.com", Some("gpt-4")).1,
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            resolve("https://proxy.example.com/v1/openai", Some("o3")).1,
            "https://proxy.example.com/v1/openai/responses"
        );
    }

    #[test]
    fn base_url_is_trimmed() {
        assert_eq!(
            build_endpoint(
                "  https://api.example.com/v1/ \n",
                ApiShape::Responses
            ),
            "https://api.example.com/v1/responses"
        );
        assert_eq!(
            build_endpoint(
                "https://api.example.com/",
                ApiShape::ChatCompletions
            ),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
