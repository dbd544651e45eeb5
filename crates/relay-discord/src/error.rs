use relay_engine::DeliveryError;

/// Errors produced by the Discord adapter.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("not a Discord snowflake: {0:?}")]
    InvalidId(String),
}

impl From<DiscordError> for DeliveryError {
    fn from(e: DiscordError) -> Self {
        DeliveryError::Transport(e.to_string())
    }
}
