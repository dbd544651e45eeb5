use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{CreateChannel, CreateMessage};
use serenity::cache::Cache;
use serenity::http::Http;
use serenity::model::channel::{ChannelType, GuildChannel};
use serenity::model::id::{ChannelId as SerenityChannelId, GuildId};
use tracing::debug;

use relay_core::{ChannelId, GroupId};
use relay_engine::{
    ChannelInfo, DeliveryError, GroupInfo, MirrorChannel, OutboundUnit, RelayTransport,
};

use crate::embed::to_create_embed;
use crate::error::DiscordError;

/// [`RelayTransport`] over serenity's REST client and guild cache.
///
/// Guild lookups go through the cache (populated from the gateway); channel
/// listings go through HTTP so a mirror created a moment ago is always seen.
#[derive(Clone)]
pub struct DiscordTransport {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordTransport {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

/// Parse a non-zero snowflake. Serenity ids panic on zero.
fn snowflake(id: &str) -> Result<u64, DiscordError> {
    match id.parse::<u64>() {
        Ok(n) if n != 0 => Ok(n),
        _ => Err(DiscordError::InvalidId(id.to_string())),
    }
}

fn channel_info(channel: &GuildChannel) -> ChannelInfo {
    ChannelInfo {
        id: ChannelId(channel.id.to_string()),
        name: channel.name.clone(),
        text_capable: matches!(channel.kind, ChannelType::Text | ChannelType::News),
    }
}

#[async_trait]
impl RelayTransport for DiscordTransport {
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, DeliveryError> {
        Ok(self
            .cache
            .guilds()
            .into_iter()
            .filter_map(|gid| {
                self.cache.guild(gid).map(|g| GroupInfo {
                    id: GroupId(gid.to_string()),
                    name: g.name.clone(),
                })
            })
            .collect())
    }

    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupInfo>, DeliveryError> {
        let Ok(raw) = snowflake(id.as_str()) else {
            debug!(group = %id, "destination is not a guild id");
            return Ok(None);
        };
        Ok(self.cache.guild(GuildId::new(raw)).map(|g| GroupInfo {
            id: id.clone(),
            name: g.name.clone(),
        }))
    }

    async fn list_channels(&self, group: &GroupId) -> Result<Vec<ChannelInfo>, DeliveryError> {
        let gid = GuildId::new(snowflake(group.as_str())?);
        if self.cache.guild(gid).is_none() {
            // left or removed since the caller looked it up
            return Err(DeliveryError::DestinationNotFound(group.clone()));
        }
        let channels = gid
            .channels(&self.http)
            .await
            .map_err(DiscordError::from)?;
        Ok(channels.values().map(channel_info).collect())
    }

    async fn create_channel(
        &self,
        group: &GroupId,
        name: &str,
    ) -> Result<ChannelInfo, DeliveryError> {
        let gid = GuildId::new(snowflake(group.as_str())?);
        let created = gid
            .create_channel(&self.http, CreateChannel::new(name).kind(ChannelType::Text))
            .await
            .map_err(|e| DeliveryError::ChannelCreationFailed {
                group: group.clone(),
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(channel_info(&created))
    }

    async fn send(&self, channel: &MirrorChannel, unit: &OutboundUnit) -> Result<(), DeliveryError> {
        let target = SerenityChannelId::new(snowflake(channel.id.as_str())?);
        let message = match unit {
            OutboundUnit::Text(text) => CreateMessage::new().content(text),
            OutboundUnit::Embed(embed) => CreateMessage::new().embed(to_create_embed(embed)),
            OutboundUnit::Attachment(url) => CreateMessage::new().content(url),
        };
        target
            .send_message(&self.http, message)
            .await
            .map_err(|e| DeliveryError::SendFailed(e.to_string()))?;
        Ok(())
    }
}
