use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use relay_core::config::DEFAULT_CONFIG_PATH;
use relay_discord::DiscordAdapter;
use relay_engine::Dispatcher;

mod health;

const DEFAULT_LOG_FILTER: &str =
    "relay_gateway=info,relay_engine=info,relay_discord=info,relay_core=info";

/// Relay messages from source channels into mirror channels on other guilds.
#[derive(Debug, Parser)]
#[command(name = "relay-gateway", version)]
struct Cli {
    /// Path to the redirect configuration (.json or .toml).
    #[arg(short, long, env = "RELAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Port for the liveness endpoint. Disabled when unset or not a number.
    #[arg(long, env = "PORT")]
    port: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    // any config problem is fatal: no partial rule set is ever used
    let config = match relay_core::config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(code = e.code(), path = %cli.config, "{e}");
            return Err(e.into());
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(&config));

    if let Some(port) = health::parse_port(cli.port.as_deref()) {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let router = health::build_router(Arc::clone(&dispatcher));
        info!(%addr, "starting web server");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "web server stopped");
            }
        });
    }

    DiscordAdapter::new(&config.token, dispatcher).run().await;
    Ok(())
}
