use crate::openai::{AiError, ApiShape, NormalizedReply, ReplySource};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

/// Extract the reply text from a successful response body.
///
/// Responses bodies never fail: when no structured text is found the raw
/// body is returned verbatim so callers never see an empty reply. Chat
/// completions bodies fail with [`AiError::Parse`] when
/// `choices[0].message.content` is missing.
pub fn normalize(
    shape: ApiShape,
    raw_body: &str,
) -> Result<NormalizedReply, AiError> {
    let payload = match serde_json::from_str::<Value>(raw_body) {
        Ok(payload) => payload,
        Err(e) => {
            return match shape {
                ApiShape::Responses => {
                    warn!(
                        error = %e,
                        "Responses body is not JSON, returning raw body"
                    );
                    Ok(reply(&Value::Null, raw_body, ReplySource::RawBody))
                }
                ApiShape::ChatCompletions => Err(AiError::Parse {
                    reason: format!("body is not JSON: {}", e),
                    body: raw_body.to_string(),
                }),
            };
        }
    };

    let (text, source) = match shape {
        ApiShape::ChatCompletions => chat_choice_content(&payload)
            .map(|text| (text.to_string(), ReplySource::ChatChoice))
            .ok_or_else(|| AiError::Parse {
                reason: "missing choices[0].message.content".to_string(),
                body: raw_body.to_string(),
            })?,
        ApiShape::Responses => responses_text(&payload, raw_body),
    };

    if source.is_degraded(shape) {
        warn!(
            shape = %shape,
            source = source.as_str(),
            "Reply extracted through fallback path"
        );
    }

    Ok(reply(&payload, &text, source))
}

fn responses_text(payload: &Value, raw_body: &str) -> (String, ReplySource) {
    if let Some(text) = payload
        .get("output_text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
    {
        return (text.to_string(), ReplySource::OutputText);
    }
    if let Some(text) = output_items_text(payload) {
        return (text, ReplySource::OutputItems);
    }
    if let Some(text) = chat_choice_content(payload).filter(|t| !t.is_empty())
    {
        return (text.to_string(), ReplySource::ChatChoice);
    }
    (raw_body.to_string(), ReplySource::RawBody)
}

/// `choices[0].message.content`
fn chat_choice_content(payload: &Value) -> Option<&str> {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
}

/// Concatenated text parts of every `message` item in `output`.
fn output_items_text(payload: &Value) -> Option<String> {
    let items = payload.get("output").and_then(Value::as_array)?;
    let mut text = String::new();
    for item in items {
        if item.get("type").and_then(Value::as_str) != Some("message") {
            continue;
        }
        let Some(parts) = item.get("content").and_then(Value::as_array) else {
            continue;
        };
        for part in parts {
            if let Some(chunk) = part.get("text").and_then(Value::as_str) {
                text.push_str(chunk);
            }
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn reply(payload: &Value, text: &str, source: ReplySource) -> NormalizedReply {
    let usage = payload.get("usage");
    let token_count = |primary: &str, alias: Option<&str>| {
        usage
            .and_then(|usage| {
                usage
                    .get(primary)
                    .or_else(|| alias.and_then(|alias| usage.get(alias)))
            })
            .and_then(Value::as_i64)
            .unwrap_or(-1)
    };

    NormalizedReply {
        text: text.to_string(),
        request_id: non_empty_str(payload, "id"),
        created_at: created_at(payload),
        model_used: non_empty_str(payload, "model"),
        prompt_tokens: token_count("prompt_tokens", Some("input_tokens")),
        completion_tokens: token_count(
            "completion_tokens",
            Some("output_tokens"),
        ),
        total_tokens: token_count("total_tokens", None),
        source,
    }
}

fn non_empty_str(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// `created` (chat) or `created_at` (responses) in epoch seconds, or now.
fn created_at(payload: &Value) -> DateTime<Utc> {
    payload
        .get("created")
        .or_else(|| payload.get("created_at"))
        .and_then(Value::as_i64)
        .filter(|secs| *secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
