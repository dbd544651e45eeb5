//! Mirror channel lookup and on-demand provisioning.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use relay_core::config::MIRROR_PREFIX;
use relay_core::GroupId;

use crate::error::DeliveryError;
use crate::transport::{MirrorChannel, RelayTransport};

/// Name of the mirror channel for a given source channel name.
pub fn mirror_name(source_channel_name: &str) -> String {
    format!("{MIRROR_PREFIX}{}", source_channel_name.to_lowercase())
}

/// Resolves a destination group to its mirror channel, creating it when absent.
///
/// Lookups for the same (group, mirror name) pair are serialised so two
/// concurrent branches cannot both decide the channel is missing and create
/// it twice. Different pairs never wait on each other.
#[derive(Default)]
pub struct ChannelResolver {
    locks: DashMap<(GroupId, String), Arc<Mutex<()>>>,
}

impl ChannelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the mirror of `source_channel_name` inside `group`.
    ///
    /// Returns `Ok(None)` when the group itself is unknown; the caller skips
    /// that destination silently.
    pub async fn resolve<T>(
        &self,
        transport: &T,
        group: &GroupId,
        source_channel_name: &str,
    ) -> Result<Option<MirrorChannel>, DeliveryError>
    where
        T: RelayTransport + ?Sized,
    {
        let Some(info) = transport.find_group(group).await? else {
            debug!(group = %group, "destination group not visible, skipping");
            return Ok(None);
        };

        let name = mirror_name(source_channel_name);
        let lock = Arc::clone(
            self.locks
                .entry((group.clone(), name.clone()))
                .or_default()
                .value(),
        );
        let _guard = lock.lock().await;

        let existing = transport
            .list_channels(group)
            .await?
            .into_iter()
            .find(|c| c.name.to_lowercase() == name);

        if let Some(channel) = existing {
            if !channel.text_capable {
                return Err(DeliveryError::DestinationNotTextCapable {
                    group: group.clone(),
                    name: channel.name,
                });
            }
            return Ok(Some(MirrorChannel::new(info, channel)));
        }

        info!(group = %group, channel = %name, "creating mirror channel");
        let created = transport
            .create_channel(group, &name)
            .await
            .map_err(|e| match e {
                e @ DeliveryError::ChannelCreationFailed { .. } => e,
                other => DeliveryError::ChannelCreationFailed {
                    group: group.clone(),
                    name: name.clone(),
                    reason: other.to_string(),
                },
            })?;

        Ok(Some(MirrorChannel::new(info, created)))
    }
}
