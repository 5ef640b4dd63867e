//! Wire types for the chat-completions surface.
//!
//! Inbound types are lenient about what they accept: every field the gateway
//! does not act on is carried in a flattened map so it reaches the backend
//! untouched. Backend response types default every optional field, since
//! upstream servers routinely omit parts of the envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Inbound (what clients send us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Every other top-level field (`top_p`, `stop`, `tools`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A conversation message. Only `role` is typed; `content` and everything
/// else stay opaque so an explicit `null` survives the trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Outbound (what we send to the backend)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct BackendRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u64,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_template_kwargs: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Backend responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendResponse {
    #[serde(default)]
    pub choices: Vec<BackendChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendChoice {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub message: BackendMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

/// The part of a streamed chunk that the reasoning filter looks at.
///
/// Built from any parsed JSON value, whatever its shape; the original payload
/// text is what gets forwarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkProbe {
    reasoning: bool,
}

impl ChunkProbe {
    /// Look at the first choice's delta. `reasoning_content` counts as present
    /// whatever its type, `""` included; JSON `null` counts as absent.
    pub fn inspect(chunk: &Value) -> Self {
        let reasoning = chunk
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("delta"))
            .and_then(|delta| delta.get("reasoning_content"))
            .is_some_and(|field| !field.is_null());
        Self { reasoning }
    }

    pub fn carries_reasoning(&self) -> bool {
        self.reasoning
    }
}

// ---------------------------------------------------------------------------
// Downstream responses (what clients get back)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ResponseChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_attempted: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error_type: &str, message: impl Into<String>, code: u16) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                error_type: error_type.to_string(),
                code,
                model_attempted: None,
            },
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.error.model_attempted = Some(model.into());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("invalid_request_error", message, 404)
    }
}
