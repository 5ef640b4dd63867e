use chat_gateway::config::config_search_paths;
use chat_gateway::models::fetch_backend_models;
use chat_gateway::{build_router, AppState, GatewayConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "chat-gateway",
    about = "Serve chat-completions clients from a different inference backend",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Backend preset name (overrides config)
    #[arg(long)]
    backend: Option<String>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,

    /// Print the models the backend advertises and exit
    #[arg(long)]
    list_backend_models: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref backend) = cli.backend {
        config.apply_preset(backend);
    }

    let client = reqwest::Client::builder().build()?;

    if cli.list_backend_models {
        let base_url = config.effective_base_url()?;
        let api_key = config.resolve_api_key()?;
        for id in fetch_backend_models(&client, &base_url, &api_key).await? {
            println!("{id}");
        }
        return Ok(());
    }

    let state = Arc::new(AppState::from_config(config.clone(), client)?);

    info!("chat-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend:   {} ({})", config.backend.name, state.upstream.base_url());
    info!("  Models:    {} mapped", state.resolver.len());
    info!(
        "  Policy:    suppress_reasoning={} force_streaming={} thinking={} framing={:?}",
        config.policy.suppress_reasoning,
        config.policy.force_streaming,
        config.policy.enable_thinking,
        config.policy.framing
    );
    info!(
        "  Timeouts:  {}s default, {} unbounded model(s)",
        config.timeouts.default_secs,
        config.timeouts.unbounded_models.len()
    );

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OPENAI_BASE_URL=http://localhost:{}/v1", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
