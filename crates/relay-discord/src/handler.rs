use std::sync::Arc;

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::GuildId;
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use relay_core::{ChannelId, GroupId, InboundMessage};
use relay_engine::Dispatcher;

use crate::embed::from_serenity;
use crate::transport::DiscordTransport;

/// Serenity event handler wired to the relay dispatcher.
///
/// Each message is relayed on its own task, so delivery order across events is
/// not guaranteed, even for one source channel.
pub struct RelayHandler {
    pub dispatcher: Arc<Dispatcher>,
}

#[async_trait]
impl EventHandler for RelayHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            name = %ready.user.name,
            guilds = ready.guilds.len(),
            "Discord bot connected"
        );
    }

    /// Every guild is in the cache now, so destinations can be checked.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        info!(guilds = guilds.len(), "guild cache ready");
        let transport = DiscordTransport::new(Arc::clone(&ctx.http), Arc::clone(&ctx.cache));
        if let Err(e) = self.dispatcher.audit(&transport).await {
            warn!(error = %e, "destination audit failed");
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let source = ChannelId(msg.channel_id.to_string());
        if !self.dispatcher.is_source(&source) {
            return;
        }

        let inbound = to_inbound(&ctx, &msg, source).await;
        let transport = DiscordTransport::new(Arc::clone(&ctx.http), Arc::clone(&ctx.cache));
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            let report = dispatcher.handle(&transport, &inbound).await;
            debug!(
                source = %inbound.channel_id,
                units = report.units_sent(),
                failed = report.failures().count(),
                "message relayed"
            );
        });
    }
}

/// Build the platform-neutral view of a Discord message.
async fn to_inbound(ctx: &Context, msg: &Message, channel_id: ChannelId) -> InboundMessage {
    let guild_name = msg
        .guild_id
        .and_then(|gid| ctx.cache.guild(gid).map(|g| g.name.clone()))
        .unwrap_or_default();

    let channel_name = match msg.channel_id.name(ctx).await {
        Ok(name) => name,
        Err(e) => {
            warn!(channel = %msg.channel_id, error = %e, "could not resolve channel name");
            msg.channel_id.to_string()
        }
    };

    let author = match msg.author_nick(ctx).await {
        Some(nick) => nick,
        None => msg.author.display_name().to_string(),
    };

    InboundMessage {
        channel_id,
        channel_name,
        guild_id: msg.guild_id.map(|g| GroupId(g.to_string())),
        guild_name,
        author,
        content: msg.content.clone(),
        attachments: msg.attachments.iter().map(|a| a.url.clone()).collect(),
        embeds: msg.embeds.iter().map(from_serenity).collect(),
    }
}
