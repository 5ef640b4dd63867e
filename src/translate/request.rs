//! Build the backend request from an inbound chat request.
//!
//! Messages are carried over exactly as received. Sampling defaults are filled
//! in, the streaming decision is made according to the configured policy, and
//! the resolved backend model decides how long the call may take.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;

use super::types::{BackendRequest, ChatRequest};
use crate::config::GatewayConfig;

/// Whether the client's `stream` flag is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingPolicy {
    ClientControlled,
    ForceOn,
}

impl StreamingPolicy {
    pub fn decide(self, requested: Option<bool>) -> bool {
        match self {
            Self::ClientControlled => requested.unwrap_or(false),
            Self::ForceOn => true,
        }
    }
}

/// Decides which backend models are exempt from the request timeout.
pub trait LatencyClass: Send + Sync {
    fn is_unbounded(&self, backend_model: &str) -> bool;
}

/// Exact-match table of backend model ids allowed to run without a timeout.
#[derive(Debug, Clone, Default)]
pub struct UnboundedModels(HashSet<String>);

impl UnboundedModels {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(ids.into_iter().map(Into::into).collect())
    }
}

impl LatencyClass for UnboundedModels {
    fn is_unbounded(&self, backend_model: &str) -> bool {
        self.0.contains(backend_model)
    }
}

impl<F> LatencyClass for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_unbounded(&self, backend_model: &str) -> bool {
        self(backend_model)
    }
}

/// A backend request plus the transport settings chosen for it.
#[derive(Debug, Clone)]
pub struct BackendCall {
    pub body: BackendRequest,
    /// `None` means no timeout.
    pub timeout: Option<Duration>,
}

impl BackendCall {
    pub fn is_streaming(&self) -> bool {
        self.body.stream
    }
}

pub struct RequestTranscoder {
    default_temperature: f64,
    default_max_tokens: u64,
    streaming: StreamingPolicy,
    enable_thinking: bool,
    drop_params: Vec<String>,
    default_timeout: Duration,
    latency: Box<dyn LatencyClass>,
}

impl std::fmt::Debug for RequestTranscoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTranscoder")
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("streaming", &self.streaming)
            .field("enable_thinking", &self.enable_thinking)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl RequestTranscoder {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let streaming = if config.policy.force_streaming {
            StreamingPolicy::ForceOn
        } else {
            StreamingPolicy::ClientControlled
        };

        Self {
            default_temperature: config.defaults.temperature,
            default_max_tokens: config.defaults.max_tokens,
            streaming,
            enable_thinking: config.policy.enable_thinking,
            drop_params: config.params.drop.clone(),
            default_timeout: Duration::from_secs(config.timeouts.default_secs),
            latency: Box::new(UnboundedModels::new(
                config.timeouts.unbounded_models.iter().cloned(),
            )),
        }
    }

    /// Swap the latency classifier, e.g. for a family rule the table can't express.
    #[must_use]
    pub fn with_latency_class(mut self, latency: impl LatencyClass + 'static) -> Self {
        self.latency = Box::new(latency);
        self
    }

    pub fn streaming_policy(&self) -> StreamingPolicy {
        self.streaming
    }

    pub fn timeout_for(&self, backend_model: &str) -> Option<Duration> {
        if self.latency.is_unbounded(backend_model) {
            None
        } else {
            Some(self.default_timeout)
        }
    }

    pub fn build(&self, inbound: &ChatRequest, backend_model: &str) -> BackendCall {
        let mut extra = inbound.extra.clone();
        for param in &self.drop_params {
            extra.remove(param);
        }

        let chat_template_kwargs = if self.enable_thinking {
            extra.remove("chat_template_kwargs");
            Some(json!({ "thinking": true }))
        } else {
            None
        };

        let body = BackendRequest {
            model: backend_model.to_string(),
            messages: inbound.messages.clone(),
            temperature: inbound.temperature.unwrap_or(self.default_temperature),
            max_tokens: inbound.max_tokens.unwrap_or(self.default_max_tokens),
            stream: self.streaming.decide(inbound.stream),
            chat_template_kwargs,
            extra,
        };

        BackendCall {
            timeout: self.timeout_for(backend_model),
            body,
        }
    }
}
