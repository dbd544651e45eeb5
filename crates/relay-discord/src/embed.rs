//! Conversion between serenity embeds and the relay's platform-neutral embed.
//!
//! Inbound embeds are captured field by field so they can be re-sent to the
//! mirror channel as-is; the transformer's rich embed goes out through the
//! same builder.

use serenity::builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};
use serenity::model::channel::Embed;

use relay_core::{EmbedField, InboundEmbed};

/// Capture a received embed.
pub fn from_serenity(embed: &Embed) -> InboundEmbed {
    InboundEmbed {
        kind: embed.kind.clone(),
        title: embed.title.clone(),
        description: embed.description.clone(),
        url: embed.url.clone(),
        color: embed.colour.map(|c| c.0),
        fields: embed
            .fields
            .iter()
            .map(|f| EmbedField {
                name: f.name.clone(),
                value: f.value.clone(),
                inline: f.inline,
            })
            .collect(),
        footer: embed.footer.as_ref().map(|f| f.text.clone()),
        image_url: embed.image.as_ref().map(|i| i.url.clone()),
        thumbnail_url: embed.thumbnail.as_ref().map(|t| t.url.clone()),
        author_name: embed.author.as_ref().map(|a| a.name.clone()),
    }
}

/// Build a serenity `CreateEmbed` for sending.
pub fn to_create_embed(embed: &InboundEmbed) -> CreateEmbed {
    let mut e = CreateEmbed::new();
    if let Some(ref t) = embed.title {
        e = e.title(t);
    }
    if let Some(ref d) = embed.description {
        e = e.description(d);
    }
    if let Some(ref u) = embed.url {
        e = e.url(u);
    }
    if let Some(c) = embed.color {
        e = e.colour(c);
    }
    for field in &embed.fields {
        e = e.field(&field.name, &field.value, field.inline);
    }
    if let Some(ref f) = embed.footer {
        e = e.footer(CreateEmbedFooter::new(f));
    }
    if let Some(ref i) = embed.image_url {
        e = e.image(i);
    }
    if let Some(ref t) = embed.thumbnail_url {
        e = e.thumbnail(t);
    }
    if let Some(ref a) = embed.author_name {
        e = e.author(CreateEmbedAuthor::new(a));
    }
    e
}
