use crate::config::GatewayConfig;
use crate::error::{map_error, GatewayError, Result};
use crate::models::ModelResolver;
use crate::proxy::{self, Upstream};
use crate::translate::request::{BackendCall, RequestTranscoder};
use crate::translate::streaming::StreamOptions;
use crate::translate::types::{ChatRequest, ErrorEnvelope};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Everything a request needs, fixed at startup.
#[derive(Debug)]
pub struct AppState {
    pub config: GatewayConfig,
    pub upstream: Upstream,
    pub resolver: ModelResolver,
    pub transcoder: RequestTranscoder,
    pub stream_options: StreamOptions,
}

impl AppState {
    /// Build the runtime state, resolving the base URL and the API key from
    /// the environment.
    pub fn from_config(config: GatewayConfig, client: reqwest::Client) -> Result<Self> {
        let base_url = config.effective_base_url()?;
        let api_key = config.resolve_api_key()?;
        Ok(Self::with_backend(config, client, base_url, api_key))
    }

    pub fn with_backend(
        config: GatewayConfig,
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            upstream: Upstream::new(client, base_url, api_key),
            resolver: ModelResolver::from_config(&config.models),
            transcoder: RequestTranscoder::from_config(&config),
            stream_options: StreamOptions {
                suppress_reasoning: config.policy.suppress_reasoning,
                framing: config.policy.framing,
            },
            config,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat/completions", post(handle_chat).fallback(handle_not_found))
        .route("/v1/chat/completions", post(handle_chat).fallback(handle_not_found))
        .route("/models", get(handle_models).fallback(handle_not_found))
        .route("/v1/models", get(handle_models).fallback(handle_not_found))
        .route("/health", get(handle_health).fallback(handle_not_found))
        .fallback(handle_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Failed to parse request");
            let err = GatewayError::invalid_request(format!("Invalid request body: {e}"));
            return error_response(&err, None);
        }
    };

    let backend_model = state.resolver.resolve(&req.model).to_string();
    let call = state.transcoder.build(&req, &backend_model);

    info!(
        client_model = %req.model,
        backend_model = %backend_model,
        stream = call.is_streaming(),
        messages = req.messages.len(),
        "Request"
    );

    if call.is_streaming() {
        handle_streaming(&state, &call, &req.model).await
    } else {
        handle_non_streaming(&state, &call, &req.model).await
    }
}

async fn handle_non_streaming(state: &AppState, call: &BackendCall, client_model: &str) -> Response {
    let include_reasoning = !state.stream_options.suppress_reasoning;
    match proxy::proxy_non_streaming(&state.upstream, call, client_model, include_reasoning).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => error_response(&e, Some(client_model)),
    }
}

async fn handle_streaming(state: &AppState, call: &BackendCall, client_model: &str) -> Response {
    let body =
        match proxy::proxy_streaming(&state.upstream, call, state.stream_options, client_model)
            .await
        {
            Ok(s) => s,
            Err(e) => return error_response(&e, Some(client_model)),
        };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn error_response(err: &GatewayError, client_model: Option<&str>) -> Response {
    let (status, envelope) = map_error(err, client_model);
    warn!(
        status = status.as_u16(),
        client_model = client_model.unwrap_or("-"),
        error = %err,
        "Request failed"
    );
    (status, Json(envelope)).into_response()
}

async fn handle_not_found(method: Method, uri: Uri) -> Response {
    let err = ErrorEnvelope::not_found(format!("Route {} {} not found", method, uri.path()));
    (StatusCode::NOT_FOUND, Json(err)).into_response()
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.config.backend.name,
        "models": state.resolver.len(),
        "suppress_reasoning": state.stream_options.suppress_reasoning,
        "force_streaming": state.config.policy.force_streaming,
    }))
}

async fn handle_models(State(state): State<Arc<AppState>>) -> Json<crate::models::ModelList> {
    let created = chrono::Utc::now().timestamp();
    Json(state.resolver.listing(&state.config.backend.name, created))
}
