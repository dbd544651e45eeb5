//! Per-event fan-out: match rules, resolve each destination, deliver.

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use relay_core::{ChannelId, GroupId, InboundMessage, RedirectRule, ValidatedConfig};

use crate::echo::EchoSuppressor;
use crate::error::DeliveryError;
use crate::resolver::ChannelResolver;
use crate::transform::{forwarded_units, transform, TransformedText};
use crate::transport::{MirrorChannel, OutboundUnit, RelayTransport};

/// What happened on one (rule, destination group) branch.
#[derive(Debug, Clone)]
pub enum BranchOutcome {
    /// The mirror channel was resolved and `units` messages went out.
    Delivered {
        channel: ChannelId,
        units: usize,
        text_suppressed: bool,
    },
    /// The destination group is unknown; skipped without error.
    GroupNotFound,
    /// Resolution failed; nothing was sent on this branch.
    Failed(DeliveryError),
}

#[derive(Debug, Clone)]
pub struct BranchReport {
    pub group: GroupId,
    pub outcome: BranchOutcome,
}

/// Result of relaying one inbound message.
#[derive(Debug, Clone, Default)]
pub struct RelayReport {
    pub branches: Vec<BranchReport>,
}

impl RelayReport {
    /// Total units delivered across every branch.
    pub fn units_sent(&self) -> usize {
        self.branches
            .iter()
            .map(|b| match b.outcome {
                BranchOutcome::Delivered { units, .. } => units,
                _ => 0,
            })
            .sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchReport> {
        self.branches
            .iter()
            .filter(|b| matches!(b.outcome, BranchOutcome::Failed(_)))
    }
}

/// Startup findings about the configured destinations.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    /// Destination groups the bot is not a member of.
    pub missing_groups: Vec<GroupId>,
    /// (group, channel) pairs where a destination group hosts a configured source.
    pub loop_suspects: Vec<(GroupId, ChannelId)>,
}

/// Owns the validated rules plus the shared resolver and echo state.
pub struct Dispatcher {
    rules: Vec<RedirectRule>,
    sources: Vec<ChannelId>,
    destinations: Vec<GroupId>,
    resolver: ChannelResolver,
    echo: EchoSuppressor,
}

impl Dispatcher {
    pub fn new(config: &ValidatedConfig) -> Self {
        Self {
            rules: config.redirects.clone(),
            sources: config.source_channels().into_iter().cloned().collect(),
            destinations: config.destination_groups().into_iter().cloned().collect(),
            resolver: ChannelResolver::new(),
            echo: EchoSuppressor::new(config.echo_scope),
        }
    }

    pub fn rules(&self) -> &[RedirectRule] {
        &self.rules
    }

    /// Cheap pre-check so adapters can drop unrelated events before building
    /// an [`InboundMessage`].
    pub fn is_source(&self, channel: &ChannelId) -> bool {
        self.rules.iter().any(|r| r.matches(channel))
    }

    /// Relay one inbound message to every destination of every matching rule.
    ///
    /// Branches run concurrently and independently; a failing branch is logged
    /// and reported but never affects its siblings.
    #[instrument(skip_all, fields(source = %message.channel_id, origin = %message.origin()))]
    pub async fn handle<T>(&self, transport: &T, message: &InboundMessage) -> RelayReport
    where
        T: RelayTransport + ?Sized,
    {
        let matched: Vec<&RedirectRule> = self
            .rules
            .iter()
            .filter(|r| r.matches(&message.channel_id))
            .collect();

        if matched.is_empty() {
            return RelayReport::default();
        }

        let forwarded = forwarded_units(message);

        let mut branches = Vec::new();
        for rule in matched {
            let text = transform(message, &rule.options);
            for group in &rule.destinations {
                let text = text.clone();
                let forwarded = &forwarded;
                branches.push(async move {
                    let outcome = self
                        .relay_branch(transport, message, group, forwarded, text)
                        .await;
                    BranchReport {
                        group: group.clone(),
                        outcome,
                    }
                });
            }
        }

        let report = RelayReport {
            branches: join_all(branches).await,
        };
        debug!(
            branches = report.branches.len(),
            units = report.units_sent(),
            "relay complete"
        );
        report
    }

    async fn relay_branch<T>(
        &self,
        transport: &T,
        message: &InboundMessage,
        group: &GroupId,
        forwarded: &[OutboundUnit],
        text: Option<TransformedText>,
    ) -> BranchOutcome
    where
        T: RelayTransport + ?Sized,
    {
        let mirror = match self
            .resolver
            .resolve(transport, group, &message.channel_name)
            .await
        {
            Ok(Some(mirror)) => mirror,
            Ok(None) => return BranchOutcome::GroupNotFound,
            Err(e) => {
                warn!(
                    source = %message.channel_id,
                    destination = %group,
                    error = %e,
                    "could not redirect message"
                );
                return BranchOutcome::Failed(e);
            }
        };

        info!(
            author = %message.author,
            from = %message.origin(),
            to = %mirror.origin(),
            "redirecting message"
        );

        let mut units = 0;
        for unit in forwarded {
            if self.deliver(transport, &mirror, unit).await {
                units += 1;
            }
        }

        let mut text_suppressed = false;
        if let Some(text) = text {
            match self.echo.try_claim(&mirror.id, &text.rendered) {
                None => {
                    debug!(channel = %mirror.id, "identical to last echo, skipping text");
                    text_suppressed = true;
                }
                Some(claim) => {
                    if self.deliver(transport, &mirror, &text.unit).await {
                        units += 1;
                    } else {
                        self.echo.release(claim);
                    }
                }
            }
        }

        BranchOutcome::Delivered {
            channel: mirror.id,
            units,
            text_suppressed,
        }
    }

    async fn deliver<T>(&self, transport: &T, mirror: &MirrorChannel, unit: &OutboundUnit) -> bool
    where
        T: RelayTransport + ?Sized,
    {
        match transport.send(mirror, unit).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    destination = %mirror.group_id,
                    channel = %mirror.id,
                    kind = unit.kind(),
                    error = %e,
                    "send failed"
                );
                false
            }
        }
    }

    /// Check the configured destinations against what the transport can see.
    ///
    /// Logs groups the bot has not joined, and destination groups that contain
    /// a channel which is itself a relay source (a possible multi-hop loop the
    /// validator cannot detect).
    pub async fn audit<T>(&self, transport: &T) -> Result<AuditReport, DeliveryError>
    where
        T: RelayTransport + ?Sized,
    {
        let joined = transport.list_groups().await?;

        let mut report = AuditReport::default();
        for group in &self.destinations {
            if !joined.iter().any(|g| &g.id == group) {
                warn!(destination = %group, "bot is not a member of destination group");
                report.missing_groups.push(group.clone());
                continue;
            }
            for channel in transport.list_channels(group).await? {
                if self.sources.contains(&channel.id) {
                    warn!(
                        destination = %group,
                        channel = %channel.id,
                        name = %channel.name,
                        "destination group contains a relay source; messages may loop"
                    );
                    report.loop_suspects.push((group.clone(), channel.id));
                }
            }
        }

        info!(
            groups = joined.len(),
            missing = report.missing_groups.len(),
            "destination audit complete"
        );
        Ok(report)
    }
}
