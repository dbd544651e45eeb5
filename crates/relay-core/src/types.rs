use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform identifier of a chat channel (a Discord snowflake, kept as text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of a destination group (a Discord guild). Mirror channels are
/// provisioned inside the group on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for GroupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single name/value row inside an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// Platform-neutral embed. Used both for embeds carried by an inbound message
/// (forwarded verbatim) and for the rich embed the transformer builds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEmbed {
    /// Embed type tag as reported by the platform (`"rich"`, `"link"`, `"image"`, …).
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub color: Option<u32>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author_name: Option<String>,
}

impl InboundEmbed {
    pub fn is_rich(&self) -> bool {
        self.kind.as_deref() == Some("rich")
    }
}

/// A message observed in a channel that may be a redirect source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel_id: ChannelId,
    /// Channel name as shown on the platform (not lowercased).
    pub channel_name: String,
    pub guild_id: Option<GroupId>,
    pub guild_name: String,
    /// Author's display name in the source guild (nickname when set).
    pub author: String,
    /// Plain text body. Empty when the message only carries embeds/attachments.
    #[serde(default)]
    pub content: String,
    /// Attachment URLs in the order they were posted.
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub embeds: Vec<InboundEmbed>,
}

impl InboundMessage {
    /// `guild/channel` as used in attribution lines and logs.
    pub fn origin(&self) -> String {
        format!("{}/{}", self.guild_name, self.channel_name)
    }
}
