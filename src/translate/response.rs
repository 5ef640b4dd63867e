use super::types::{BackendResponse, ChatResponse, ResponseChoice, ResponseMessage};

/// Reshape a buffered backend response into the envelope the client expects.
///
/// The id and timestamp are minted here rather than copied from the backend,
/// and `model` is the name the client asked for. Missing content becomes an
/// empty string and missing usage becomes all zeros.
pub fn reshape(
    resp: BackendResponse,
    client_model: &str,
    include_reasoning: bool,
) -> ChatResponse {
    let choices = resp
        .choices
        .into_iter()
        .enumerate()
        .map(|(position, choice)| ResponseChoice {
            index: choice.index.unwrap_or(position as u32),
            message: ResponseMessage {
                role: choice
                    .message
                    .role
                    .unwrap_or_else(|| "assistant".to_string()),
                content: choice.message.content.unwrap_or_default(),
                reasoning_content: choice
                    .message
                    .reasoning_content
                    .filter(|_| include_reasoning),
            },
            finish_reason: choice.finish_reason,
        })
        .collect();

    ChatResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: client_model.to_string(),
        choices,
        usage: resp.usage.unwrap_or_default(),
    }
}

/// Pull the human-readable detail out of a backend error body.
///
/// Understands `{"error":{"message":..}}`, `{"error":".."}`, `{"detail":..}`
/// and `{"message":..}`; anything else is returned raw, cut to `max` bytes.
/// An empty detail falls back to naming the status.
pub fn upstream_detail(status: u16, body: &str, max: usize) -> String {
    let detail = extract_detail(body, max);
    if detail.is_empty() {
        format!("Backend returned status {status}")
    } else {
        detail
    }
}

fn extract_detail(body: &str, max: usize) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error"),
            value.get("detail"),
            value.get("message"),
        ];
        for candidate in candidates.into_iter().flatten() {
            if let Some(text) = candidate.as_str().map(str::trim).filter(|t| !t.is_empty()) {
                return text.to_string();
            }
        }
    }

    truncate(body.trim(), max).to_string()
}

/// Cut `s` to at most `max` bytes without splitting a character.
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::types::Usage;

    fn backend(json: serde_json::Value) -> BackendResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_missing_content_and_usage_default_to_zero_values() {
        let resp = backend(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant"}, "finish_reason": "stop"}]
        }));
        let out = reshape(resp, "gpt-4o", true);

        assert_eq!(out.choices.len(), 1);
        assert_eq!(out.choices[0].message.content, "");
        assert_eq!(out.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(out.usage, Usage::default());
        assert_eq!(out.usage.total_tokens, 0);
    }

    #[test]
    fn test_reports_client_model_and_fresh_identity() {
        let resp = backend(serde_json::json!({
            "id": "upstream-id",
            "created": 1,
            "model": "deepseek-ai/deepseek-v3.1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }));
        let first = reshape(resp.clone(), "gpt-4o", true);
        let second = reshape(resp, "gpt-4o", true);

        assert_eq!(first.model, "gpt-4o");
        assert_eq!(first.object, "chat.completion");
        assert!(first.id.starts_with("chatcmpl-"));
        assert_ne!(first.id, "upstream-id");
        assert_ne!(first.id, second.id);
        assert!(first.created > 1);
        assert_eq!(first.usage.total_tokens, 5);
    }

    #[test]
    fn test_choices_keep_order_and_index() {
        let resp = backend(serde_json::json!({
            "choices": [
                {"index": 0, "message": {"content": "a"}},
                {"index": 1, "message": {"content": "b"}},
                {"message": {"content": "c"}}
            ]
        }));
        let out = reshape(resp, "m", true);

        let got: Vec<(u32, &str)> = out
            .choices
            .iter()
            .map(|c| (c.index, c.message.content.as_str()))
            .collect();
        assert_eq!(got, vec![(0, "a"), (1, "b"), (2, "c")]);
        assert!(out.choices.iter().all(|c| c.message.role == "assistant"));
    }

    #[test]
    fn test_reasoning_only_kept_when_allowed() {
        let json = serde_json::json!({
            "choices": [{"message": {"content": "42", "reasoning_content": "thinking"}}]
        });

        let kept = reshape(backend(json.clone()), "m", true);
        assert_eq!(kept.choices[0].message.reasoning_content.as_deref(), Some("thinking"));

        let dropped = reshape(backend(json), "m", false);
        assert!(dropped.choices[0].message.reasoning_content.is_none());
        let wire = serde_json::to_value(&dropped).unwrap();
        assert!(wire["choices"][0]["message"].get("reasoning_content").is_none());
    }

    #[test]
    fn test_upstream_detail_shapes() {
        assert_eq!(
            upstream_detail(400, r#"{"error":{"message":"Rate limit exceeded","type":"x"}}"#, 100),
            "Rate limit exceeded"
        );
        assert_eq!(upstream_detail(400, r#"{"error":"bad key"}"#, 100), "bad key");
        assert_eq!(upstream_detail(400, r#"{"detail":"not found"}"#, 100), "not found");
        assert_eq!(upstream_detail(400, r#"{"message":"nope"}"#, 100), "nope");
        assert_eq!(upstream_detail(503, "  Service Unavailable \n", 100), "Service Unavailable");
    }

    #[test]
    fn test_upstream_detail_never_empty() {
        assert_eq!(upstream_detail(502, "", 100), "Backend returned status 502");
        assert_eq!(upstream_detail(502, " \n ", 100), "Backend returned status 502");
        assert_eq!(
            upstream_detail(500, r#"{"error":{"message":""}}"#, 100),
            "Backend returned status 500"
        );
    }

    #[test]
    fn test_upstream_detail_truncates_on_char_boundary() {
        let body = "é".repeat(10);
        assert_eq!(upstream_detail(500, &body, 5), "éé");
    }
}
