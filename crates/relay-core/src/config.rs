use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::types::{ChannelId, GroupId};

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
/// Embed colour used when a rich-embed redirect sets none.
pub const DEFAULT_EMBED_COLOR: u32 = 0x78FF;
/// Largest value a 24-bit RGB colour can hold.
pub const MAX_EMBED_COLOR: u32 = 0xFF_FFFF;
/// Prefix of every mirror channel name.
pub const MIRROR_PREFIX: &str = "copy-";

/// Per-redirect transformation switches. Everything defaults to off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedirectOptions {
    /// Bold heading line (plain text) or embed title (rich embed).
    pub title: Option<String>,
    /// Send the text as an embed instead of a plain message.
    pub rich_embed: bool,
    /// Embed colour; [`DEFAULT_EMBED_COLOR`] when unset.
    pub rich_embed_color: Option<u32>,
    /// Strip `@everyone` from the relayed text.
    pub remove_everyone: bool,
    /// Strip `@here` from the relayed text.
    pub remove_here: bool,
    /// Attribute the author and `guild/channel` of origin.
    pub include_source: bool,
    /// Relay the description of the inbound rich embed instead of the text.
    #[serde(alias = "copyRichEmbed")]
    pub copy_rich_embed_description: bool,
}

impl RedirectOptions {
    pub fn embed_color(&self) -> u32 {
        self.rich_embed_color.unwrap_or(DEFAULT_EMBED_COLOR)
    }
}

/// One source→destinations mapping. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub sources: Vec<ChannelId>,
    pub destinations: Vec<GroupId>,
    pub options: RedirectOptions,
}

impl RedirectRule {
    pub fn matches(&self, channel: &ChannelId) -> bool {
        self.sources.contains(channel)
    }
}

/// Which outbound payloads the echo suppressor compares against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoScope {
    /// One last-sent value shared by every destination.
    #[default]
    Global,
    /// One last-sent value per mirror channel.
    Destination,
}

/// Configuration that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub token: String,
    pub redirects: Vec<RedirectRule>,
    pub echo_scope: EchoScope,
}

impl ValidatedConfig {
    /// Every distinct source channel across all rules.
    pub fn source_channels(&self) -> Vec<&ChannelId> {
        let mut out: Vec<&ChannelId> = Vec::new();
        for rule in &self.redirects {
            for source in &rule.sources {
                if !out.contains(&source) {
                    out.push(source);
                }
            }
        }
        out
    }

    /// Every distinct destination group across all rules.
    pub fn destination_groups(&self) -> Vec<&GroupId> {
        let mut out: Vec<&GroupId> = Vec::new();
        for rule in &self.redirects {
            for dest in &rule.destinations {
                if !out.contains(&dest) {
                    out.push(dest);
                }
            }
        }
        out
    }
}

/// Read the raw configuration document.
///
/// `.json` files are parsed as JSON, anything else as TOML. `RELAY_TOKEN`
/// overrides the token from the file. The result is untyped so the validator
/// can tell a missing key from a malformed one.
pub fn load_raw(path: &str) -> Result<serde_json::Value> {
    if !Path::new(path).exists() {
        return Err(ConfigError::Load(format!(
            "no configuration found at {path}; create one first"
        )));
    }

    let figment = if path.ends_with(".json") {
        Figment::new().merge(Json::file(path))
    } else {
        Figment::new().merge(Toml::file(path))
    };

    figment
        .merge(Env::prefixed("RELAY_").only(&["token"]))
        .extract::<serde_json::Value>()
        .map_err(|e| ConfigError::Load(e.to_string()))
}

/// Load and validate in one step.
pub fn load(path: &str) -> Result<ValidatedConfig> {
    let raw = load_raw(path)?;
    crate::validate::validate(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_off() {
        let opts: RedirectOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, RedirectOptions::default());
        assert_eq!(opts.embed_color(), 30975);
    }

    #[test]
    fn options_accept_camel_case_and_legacy_alias() {
        let opts: RedirectOptions = serde_json::from_value(serde_json::json!({
            "title": "News",
            "richEmbed": true,
            "richEmbedColor": 16711680,
            "removeEveryone": true,
            "includeSource": true,
            "copyRichEmbed": true
        }))
        .unwrap();
        assert_eq!(opts.title.as_deref(), Some("News"));
        assert!(opts.rich_embed);
        assert_eq!(opts.embed_color(), 0xFF0000);
        assert!(opts.remove_everyone);
        assert!(!opts.remove_here);
        assert!(opts.include_source);
        assert!(opts.copy_rich_embed_description);
    }

    #[test]
    fn echo_scope_parses_snake_case() {
        let scope: EchoScope = serde_json::from_str("\"destination\"").unwrap();
        assert_eq!(scope, EchoScope::Destination);
        assert_eq!(EchoScope::default(), EchoScope::Global);
    }

    #[test]
    fn distinct_sources_and_destinations_keep_first_seen_order() {
        let config = crate::validate(&serde_json::json!({
            "token": "t",
            "redirects": [
                { "sources": ["1", "2"], "destinations": ["10"] },
                { "sources": ["2", "3"], "destinations": ["11", "10"] }
            ]
        }))
        .unwrap();

        let sources: Vec<&str> = config.source_channels().iter().map(|c| c.as_str()).collect();
        assert_eq!(sources, ["1", "2", "3"]);
        let groups: Vec<&str> = config.destination_groups().iter().map(|g| g.as_str()).collect();
        assert_eq!(groups, ["10", "11"]);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load("/definitely/not/here/config.json").unwrap_err();
        assert_eq!(err.code(), "LOAD_FAILED");
    }

    #[test]
    fn load_reads_json_file() {
        let dir = std::env::temp_dir().join(format!("relay-core-load-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(
            &path,
            r#"{"token":"abc","redirects":[{"sources":["1"],"destinations":["2"]}]}"#,
        )
        .unwrap();

        let config = load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.redirects.len(), 1);
        assert_eq!(config.redirects[0].sources[0].as_str(), "1");

        std::fs::remove_dir_all(&dir).ok();
    }
}
