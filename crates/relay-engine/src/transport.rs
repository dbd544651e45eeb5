use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_core::{ChannelId, GroupId, InboundEmbed};

use crate::error::DeliveryError;

/// A destination group as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupId,
    pub name: String,
}

/// A channel inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    /// Whether plain messages can be posted here (text or announcement channels).
    pub text_capable: bool,
}

/// A resolved, text-capable mirror channel that outbound units are addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorChannel {
    pub group_id: GroupId,
    pub group_name: String,
    pub id: ChannelId,
    pub name: String,
}

impl MirrorChannel {
    pub fn new(group: GroupInfo, channel: ChannelInfo) -> Self {
        Self {
            group_id: group.id,
            group_name: group.name,
            id: channel.id,
            name: channel.name,
        }
    }

    /// `guild/channel`, for log lines.
    pub fn origin(&self) -> String {
        format!("{}/{}", self.group_name, self.name)
    }
}

/// One deliverable unit. Each variant becomes exactly one platform message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum OutboundUnit {
    /// Plain (markdown) text.
    Text(String),
    /// An embed, either forwarded verbatim or built by the transformer.
    Embed(InboundEmbed),
    /// A bare attachment URL; the platform renders its preview.
    Attachment(String),
}

impl OutboundUnit {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundUnit::Text(_) => "text",
            OutboundUnit::Embed(_) => "embed",
            OutboundUnit::Attachment(_) => "attachment",
        }
    }
}

/// Everything the relay engine needs from the chat platform.
///
/// Implementations must be `Send + Sync`: a single transport is shared by all
/// branches of an event, which run concurrently.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Every group the bot is a member of.
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, DeliveryError>;

    /// Look up a single group. `Ok(None)` means the bot cannot see it.
    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupInfo>, DeliveryError>;

    /// Current channels of a group. Must reflect channels created earlier in
    /// the process lifetime.
    async fn list_channels(&self, group: &GroupId) -> Result<Vec<ChannelInfo>, DeliveryError>;

    /// Create a text channel with exactly `name` and return it once it exists.
    async fn create_channel(&self, group: &GroupId, name: &str)
        -> Result<ChannelInfo, DeliveryError>;

    /// Deliver one unit to a mirror channel.
    async fn send(&self, channel: &MirrorChannel, unit: &OutboundUnit)
        -> Result<(), DeliveryError>;
}
