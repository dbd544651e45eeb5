//! Structural validation of the raw configuration document.
//!
//! Checks run in a fixed order and stop at the first failure: token, redirect
//! list, then each rule's sources, destinations, self-loops and options. No
//! partial configuration is ever returned.

use serde_json::Value;
use tracing::info;

use crate::config::{EchoScope, RedirectOptions, RedirectRule, ValidatedConfig, MAX_EMBED_COLOR};
use crate::error::{ConfigError, ListProblem, Result};
use crate::types::{ChannelId, GroupId};

/// Validate a raw config document and build the immutable rule set.
pub fn validate(raw: &Value) -> Result<ValidatedConfig> {
    let token = match raw.get("token").and_then(Value::as_str) {
        Some(t) if !t.trim().is_empty() => t.to_string(),
        _ => return Err(ConfigError::MissingToken),
    };

    let rules = list(raw.get("redirects")).map_err(ConfigError::NoRedirects)?;

    let mut redirects = Vec::with_capacity(rules.len());
    for (index, rule) in rules.iter().enumerate() {
        redirects.push(validate_rule(index, rule)?);
    }

    let echo_scope = match raw.get("echoScope") {
        None | Some(Value::Null) => EchoScope::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| ConfigError::InvalidEchoScope(e.to_string()))?,
    };

    info!(
        redirects = redirects.len(),
        echo_scope = ?echo_scope,
        "configuration loaded successfully"
    );

    Ok(ValidatedConfig {
        token,
        redirects,
        echo_scope,
    })
}

fn validate_rule(index: usize, rule: &Value) -> Result<RedirectRule> {
    let sources: Vec<ChannelId> = ids(rule.get("sources"))
        .map_err(|problem| ConfigError::InvalidSources {
            rule: index,
            problem,
        })?
        .into_iter()
        .map(ChannelId)
        .collect();

    let destinations: Vec<GroupId> = ids(rule.get("destinations"))
        .map_err(|problem| ConfigError::InvalidDestinations {
            rule: index,
            problem,
        })?
        .into_iter()
        .map(GroupId)
        .collect();

    for source in &sources {
        if destinations.iter().any(|d| d.as_str() == source.as_str()) {
            return Err(ConfigError::SelfLoop(source.to_string()));
        }
    }

    let options: RedirectOptions = match rule.get("options") {
        None | Some(Value::Null) => RedirectOptions::default(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| ConfigError::InvalidOptions {
            rule: index,
            reason: e.to_string(),
        })?,
    };

    if let Some(color) = options.rich_embed_color {
        if color > MAX_EMBED_COLOR {
            return Err(ConfigError::InvalidOptions {
                rule: index,
                reason: format!("richEmbedColor {color:#x} does not fit in 24 bits"),
            });
        }
    }

    Ok(RedirectRule {
        sources,
        destinations,
        options,
    })
}

/// A present, non-empty array.
fn list(value: Option<&Value>) -> std::result::Result<&Vec<Value>, ListProblem> {
    match value {
        None | Some(Value::Null) => Err(ListProblem::Missing),
        Some(Value::Array(items)) if items.is_empty() => Err(ListProblem::Empty),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(ListProblem::NotASequence),
    }
}

/// A non-empty array of ids, deduplicated in first-seen order.
///
/// Snowflakes written as bare numbers are accepted and normalised to text.
fn ids(value: Option<&Value>) -> std::result::Result<Vec<String>, ListProblem> {
    let items = list(value)?;
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let id = match item {
            Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
            Value::Number(n) if n.is_u64() => n.to_string(),
            _ => return Err(ListProblem::BadEntry(i)),
        };
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}
