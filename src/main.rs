use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use notes_api::config::AppConfig;
use notes_api::{create_app, AppState};

#[derive(Parser)]
#[command(name = "notes-api")]
#[command(about = "REST backend for notes, users and roles")]
#[command(version)]
struct Args {
    #[arg(long, env = "PORT", help = "Port to listen on")]
    port: Option<u16>,

    #[arg(long, env = "BIND_ADDRESS", help = "Address to bind")]
    bind: Option<String>,

    #[arg(long, help = "YAML config file used as the base layer")]
    config: Option<PathBuf>,

    #[arg(long, help = "Load environment variables from this file instead of .env")]
    env_file: Option<PathBuf>,
}

fn init_tracing() {
    let default_level = match std::env::var("LOG_MODE").as_deref() {
        Ok("DEBUG") => "debug",
        Ok("ERROR") => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load .env before anything reads the environment
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("failed to load {}", path.display()))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    init_tracing();

    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env(),
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    config.validate()?;

    tracing::info!("Starting notes-api in {:?} mode", config.environment);
    if !config.auth.jwt_enabled {
        tracing::warn!("AUTH_JWT_ENABLE=false: session binder disabled, every request is let through");
    }

    let bind_addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let sweep_every = Duration::from_secs(config.limiter.sweep_interval_secs.max(1));

    let state = AppState::connect(config).await.context("failed to initialise dependencies")?;
    let _sweeper = state.limiter.spawn_sweeper(sweep_every);

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("notes-api listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
