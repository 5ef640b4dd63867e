//! Model name resolution and listing.
//!
//! Clients speak in the model names they already know; the resolver maps those
//! onto backend identifiers through a fixed table and lets anything else
//! through untouched, so backend-native ids work without being listed.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Curated aliases used when the config does not provide a `[models]` table.
const DEFAULT_MODEL_MAP: &[(&str, &str)] = &[
    ("gpt-3.5-turbo", "nvidia/llama-3.1-nemotron-ultra-253b-v1"),
    ("gpt-4", "qwen/qwen3-coder-480b-a35b-instruct"),
    ("gpt-4-turbo", "moonshotai/kimi-k2-instruct-0905"),
    ("gpt-4o", "deepseek-ai/deepseek-v3.1"),
    ("claude-3-opus", "openai/gpt-oss-120b"),
    ("claude-3-sonnet", "openai/gpt-oss-20b"),
    ("gemini-pro", "qwen/qwen3-next-80b-a3b-thinking"),
];

/// Maps client model names to backend model names. Built once at startup.
#[derive(Debug, Clone)]
pub struct ModelResolver {
    map: HashMap<String, String>,
}

impl ModelResolver {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// The configured table, or the curated defaults when it is empty.
    pub fn from_config(models: &HashMap<String, String>) -> Self {
        if models.is_empty() {
            Self::new(default_model_map())
        } else {
            Self::new(models.clone())
        }
    }

    /// Backend id for `client_model`; unmapped names pass through unchanged.
    #[must_use]
    pub fn resolve<'a>(&'a self, client_model: &'a str) -> &'a str {
        self.map
            .get(client_model)
            .map(String::as_str)
            .unwrap_or(client_model)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Client-facing names, sorted for stable listings.
    pub fn client_models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.map.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Entries for `GET /models`, one per client-facing name.
    pub fn listing(&self, owned_by: &str, created: i64) -> ModelList {
        ModelList {
            object: "list".to_string(),
            data: self
                .client_models()
                .into_iter()
                .map(|id| ModelEntry {
                    id: id.to_string(),
                    object: "model".to_string(),
                    created,
                    owned_by: owned_by.to_string(),
                })
                .collect(),
        }
    }
}

#[must_use]
pub fn default_model_map() -> HashMap<String, String> {
    DEFAULT_MODEL_MAP
        .iter()
        .map(|(client, backend)| (client.to_string(), backend.to_string()))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub owned_by: String,
}

/// A model as reported by the backend's own `/models` endpoint.
#[derive(Debug, Deserialize)]
pub struct BackendModel {
    pub id: String,
    pub owned_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BackendModelsResponse {
    pub data: Vec<BackendModel>,
}

/// Fetch the model ids the backend itself advertises.
///
/// # Errors
/// Returns `GatewayError::Upstream` for non-2xx replies and `GatewayError::Http`
/// when the request or body decoding fails.
pub async fn fetch_backend_models(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
) -> Result<Vec<String>> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let response = client.get(&url).bearer_auth(api_key).send().await?;

    let status = response.status().as_u16();
    if status >= 400 {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::upstream(
            status,
            format!("listing models failed: {body}"),
        ));
    }

    let parsed: BackendModelsResponse = response.json().await?;
    let mut ids: Vec<String> = parsed.data.into_iter().map(|m| m.id).collect();
    ids.sort();
    Ok(ids)
}
