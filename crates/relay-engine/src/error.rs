use relay_core::GroupId;
use thiserror::Error;

/// Per-destination delivery failures. None of these are fatal: the branch is
/// abandoned for the current event and sibling branches carry on.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The destination group vanished between lookup and channel listing.
    #[error("destination group {0} was not found")]
    DestinationNotFound(GroupId),

    /// A channel with the mirror name exists but cannot receive text.
    #[error("destination channel {name} in group {group} is not a text channel")]
    DestinationNotTextCapable { group: GroupId, name: String },

    /// The mirror channel was missing and could not be created.
    #[error("could not create channel {name} in group {group}: {reason}")]
    ChannelCreationFailed {
        group: GroupId,
        name: String,
        reason: String,
    },

    /// The platform rejected a single outbound unit.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Any other transport-level failure (HTTP, gateway, bad id).
    #[error("transport error: {0}")]
    Transport(String),
}
