use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tron_watch::config::{self, Config};
use tron_watch::manager::Manager;
use tron_watch::router::ClientRegistry;
use tron_watch::store::{InMemoryEventStore, InMemorySubscriptionStore};
use tron_watch::api;

#[derive(Parser, Debug)]
#[command(name = "tron-watch", about = "Tron blockchain event-monitoring service")]
struct Cli {
    /// Path to a config file (TOML), without extension. Defaults to
    /// `config/default`.
    #[arg(long)]
    config: Option<String>,
}

fn init_tracing(cfg: &config::LoggingConfig) {
    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if cfg.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    info!(host = %config.server.host, port = config.server.port, "starting tron-watch");

    let subscription_store = InMemorySubscriptionStore::new();
    let event_store = InMemoryEventStore::new();
    let ws_registry = ClientRegistry::new();
    let manager = Manager::new(&config, subscription_store, event_store, ws_registry);

    manager.start().await?;

    let app = api::build_router(manager);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
