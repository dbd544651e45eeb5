//! Per-redirect content pipeline.
//!
//! Embeds and attachments are forwarded untouched; only the text body goes
//! through the option-driven transformation.

use relay_core::{EmbedField, InboundEmbed, InboundMessage, RedirectOptions};

use crate::transport::OutboundUnit;

/// Broadcast-all mention.
pub const EVERYONE: &str = "@everyone";
/// Broadcast-online mention.
pub const HERE: &str = "@here";

/// The text payload of a redirect plus the string the echo suppressor compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedText {
    pub unit: OutboundUnit,
    /// Embed description for rich embeds, the full message for plain text.
    pub rendered: String,
}

/// Units forwarded verbatim ahead of the text: embeds, then attachment URLs,
/// both in inbound order.
pub fn forwarded_units(message: &InboundMessage) -> Vec<OutboundUnit> {
    message
        .embeds
        .iter()
        .cloned()
        .map(OutboundUnit::Embed)
        .chain(message.attachments.iter().cloned().map(OutboundUnit::Attachment))
        .collect()
}

/// Build the text payload for one redirect. `None` when the message has no text.
pub fn transform(message: &InboundMessage, options: &RedirectOptions) -> Option<TransformedText> {
    if message.content.is_empty() {
        return None;
    }

    let mut body = message.content.clone();

    if options.copy_rich_embed_description {
        if let Some(description) = message
            .embeds
            .iter()
            .filter(|e| e.is_rich())
            .filter_map(|e| e.description.as_ref())
            .last()
        {
            body = description.clone();
        }
    }

    if options.remove_everyone {
        body = body.replace(EVERYONE, "");
    }
    if options.remove_here {
        body = body.replace(HERE, "");
    }

    let title = options.title.as_deref().filter(|t| !t.is_empty());

    if options.rich_embed {
        let mut embed = InboundEmbed {
            kind: Some("rich".to_string()),
            title: title.map(str::to_string),
            description: Some(body.clone()),
            color: Some(options.embed_color()),
            ..InboundEmbed::default()
        };
        if options.include_source {
            embed.fields.push(EmbedField {
                name: "Author".to_string(),
                value: format!("**{}** in **{}**", message.author, message.origin()),
                inline: false,
            });
        }
        return Some(TransformedText {
            unit: OutboundUnit::Embed(embed),
            rendered: body,
        });
    }

    let mut text = String::new();
    if let Some(title) = title {
        text.push_str(&format!("**{title}**\n"));
    }
    if options.include_source {
        text.push_str(&format!(
            "*Author: **{}** in **{}***\n",
            message.author,
            message.origin()
        ));
    }
    text.push('\n');
    text.push_str(&body);

    Some(TransformedText {
        unit: OutboundUnit::Text(text.clone()),
        rendered: text,
    })
}
