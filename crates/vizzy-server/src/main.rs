//! Vizzy Chat server: HTTP surface over the generation engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod state;

use state::AppState;
use vizzy_contracts::sessions::InMemorySessionStore;
use vizzy_engine::{DotEnv, EngineConfig, GenerationOrchestrator};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Parser)]
#[command(
    name = "vizzy-server",
    about = "Conversational creative-assistant backend",
    version = env!("CARGO_PKG_VERSION")
)]
struct ServerArgs {
    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BindConfig {
    host: String,
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vizzy_server=info,vizzy_engine=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vizzy Chat server");

    let dotenv = load_dotenv(&dotenv_path());
    let config = EngineConfig::from_env(&dotenv);
    info!(
        text = config.text_configured(),
        huggingface = config.huggingface_api_key.is_some(),
        replicate = config.replicate_api_key.is_some(),
        "Backend credentials loaded"
    );

    let orchestrator = GenerationOrchestrator::from_config(&config);
    let state = AppState::new(
        config,
        Arc::new(orchestrator),
        Arc::new(InMemorySessionStore::new()),
    );
    let app = api::create_router(state, dotenv.var("ALLOWED_ORIGINS").as_deref());

    let bind = resolve_bind_config(args, &dotenv);
    let addr = format!("{}:{}", bind.host, bind.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// `VIZZY_ENV_FILE` when set, otherwise `.env` in the working directory.
fn dotenv_path() -> PathBuf {
    std::env::var_os("VIZZY_ENV_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".env"))
}

fn load_dotenv(path: &Path) -> DotEnv {
    info!("Looking for .env at: {}", path.display());
    match DotEnv::load(path) {
        Some(dotenv) => {
            info!(entries = dotenv.len(), ".env file found");
            if dotenv.is_empty() {
                warn!(".env file has no KEY=value entries");
            }
            dotenv
        }
        None => {
            info!(".env file not found, using the process environment only");
            DotEnv::default()
        }
    }
}

fn resolve_bind_config(args: ServerArgs, env: &DotEnv) -> BindConfig {
    BindConfig {
        host: args.host.unwrap_or_else(|| host_from_env_or_default(env)),
        port: args.port.unwrap_or_else(|| port_from_env_or_default(env)),
    }
}

fn host_from_env_or_default(env: &DotEnv) -> String {
    match env.var("VIZZY_HOST") {
        Some(raw) => {
            let host = raw.trim();
            if host.is_empty() {
                warn!("Empty VIZZY_HOST, falling back to {DEFAULT_HOST}");
                DEFAULT_HOST.to_string()
            } else {
                host.to_string()
            }
        }
        None => DEFAULT_HOST.to_string(),
    }
}

fn port_from_env_or_default(env: &DotEnv) -> u16 {
    match env.var("VIZZY_PORT") {
        Some(raw) => match raw.trim().parse::<u16>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!("Invalid VIZZY_PORT='{}', falling back to {DEFAULT_PORT}", raw);
                DEFAULT_PORT
            }
        },
        None => DEFAULT_PORT,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
