//! Chess server binary
//!
//! Serves the game WebSocket and the game lobby endpoints.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chess_server::{
    AppState, ConnectionHub, MemoryAuthorizer, MemoryStore, ServerConfig, SessionCoordinator,
    create_router,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn print_usage() {
    println!("ML-chess Game Server");
    println!();
    println!("Usage:");
    println!("  chess_server [--config PATH] [--bind ADDR]");
    println!();
    println!("Options:");
    println!("  --config, -c   TOML config file (defaults apply when omitted)");
    println!("  --bind, -b     Listen address, overrides bind_addr from the config");
    println!();
    println!("Logging follows RUST_LOG, falling back to log_filter from the config.");
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    bind: Option<String>,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Args> {
    let mut parsed = Args::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let Some(path) = args.get(i + 1) else {
                    bail!("--config needs a path");
                };
                parsed.config = Some(PathBuf::from(path));
                i += 1;
            }
            "--bind" | "-b" => {
                let Some(addr) = args.get(i + 1) else {
                    bail!("--bind needs an address");
                };
                parsed.bind = Some(addr.clone());
                i += 1;
            }
            "help" | "--help" | "-h" => parsed.help = true,
            other => bail!("unknown argument: {other}"),
        }
        i += 1;
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&args)?;
    if args.help {
        print_usage();
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let coordinator = Arc::new(SessionCoordinator::new(Arc::new(MemoryStore::new())));
    for name in &config.initial_games {
        let id = coordinator.create_game(name)?;
        tracing::info!(game_id = id, name = %name, "initial game ready");
    }
    let auth = Arc::new(MemoryAuthorizer::from_users(&config.users));
    tracing::info!(users = config.users.len(), "loaded user tokens");

    let state = AppState::new(coordinator, Arc::new(ConnectionHub::new()), auth);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
