use std::sync::Arc;
use std::time::Duration;

use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tracing::{error, info, warn};

use relay_engine::Dispatcher;

use crate::handler::RelayHandler;

/// Delay before rebuilding the client after the gateway drops.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
/// Delay between attempts when the client cannot be built at all.
const BUILD_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Discord side of the relay.
///
/// Wraps a serenity `Client` and drives the event loop until the process exits.
/// A gateway error tears the client down and builds a fresh one; the
/// dispatcher (rules, resolver, echo state) is shared across rebuilds.
pub struct DiscordAdapter {
    dispatcher: Arc<Dispatcher>,
    token: String,
}

impl DiscordAdapter {
    pub fn new(token: &str, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            token: token.to_string(),
        }
    }

    fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }

    /// Connect to Discord and keep reconnecting whenever the gateway drops.
    ///
    /// Never returns.
    pub async fn run(self) {
        loop {
            let mut client = self.connect().await;

            info!("Discord: gateway connecting");
            if let Err(e) = client.start().await {
                warn!(error = %e, "Discord: gateway error, restarting client");
            } else {
                info!("Discord: gateway stopped cleanly, restarting client");
            }

            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// Build a client, retrying until it succeeds.
    async fn connect(&self) -> Client {
        loop {
            match self.build_client().await {
                Ok(c) => return c,
                Err(e) => {
                    error!(error = %e, "Discord: could not sign in, retrying in 30s");
                    tokio::time::sleep(BUILD_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn build_client(&self) -> Result<Client, serenity::Error> {
        let handler = RelayHandler {
            dispatcher: Arc::clone(&self.dispatcher),
        };

        Client::builder(&self.token, Self::intents())
            .event_handler(handler)
            .await
    }
}
