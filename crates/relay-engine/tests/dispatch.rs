// Drives the dispatcher end to end against an in-memory transport.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use relay_core::{validate, ChannelId, GroupId, InboundEmbed, InboundMessage};
use relay_engine::{
    BranchOutcome, ChannelInfo, DeliveryError, Dispatcher, GroupInfo, MirrorChannel, OutboundUnit,
    RelayTransport,
};

#[derive(Default)]
struct State {
    groups: HashMap<GroupId, (String, Vec<ChannelInfo>)>,
    sent: Vec<(ChannelId, OutboundUnit)>,
    created: Vec<(GroupId, String)>,
    next_id: u64,
}

#[derive(Default)]
struct MemoryTransport {
    state: Mutex<State>,
    fail_create: bool,
    fail_sends: bool,
    yield_in_send: bool,
}

impl MemoryTransport {
    fn with_groups(groups: &[(&str, &str)]) -> Self {
        let transport = Self::default();
        {
            let mut state = transport.state.lock().unwrap();
            for (id, name) in groups {
                state
                    .groups
                    .insert(GroupId::from(*id), (name.to_string(), Vec::new()));
            }
        }
        transport
    }

    fn add_channel(&self, group: &str, id: &str, name: &str, text_capable: bool) {
        let mut state = self.state.lock().unwrap();
        let entry = state.groups.get_mut(&GroupId::from(group)).unwrap();
        entry.1.push(ChannelInfo {
            id: ChannelId::from(id),
            name: name.to_string(),
            text_capable,
        });
    }

    fn sent(&self) -> Vec<(ChannelId, OutboundUnit)> {
        self.state.lock().unwrap().sent.clone()
    }

    fn created(&self) -> Vec<(GroupId, String)> {
        self.state.lock().unwrap().created.clone()
    }
}

#[async_trait]
impl RelayTransport for MemoryTransport {
    async fn list_groups(&self) -> Result<Vec<GroupInfo>, DeliveryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .groups
            .iter()
            .map(|(id, (name, _))| GroupInfo {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn find_group(&self, id: &GroupId) -> Result<Option<GroupInfo>, DeliveryError> {
        let state = self.state.lock().unwrap();
        Ok(state.groups.get(id).map(|(name, _)| GroupInfo {
            id: id.clone(),
            name: name.clone(),
        }))
    }

    async fn list_channels(&self, group: &GroupId) -> Result<Vec<ChannelInfo>, DeliveryError> {
        let state = self.state.lock().unwrap();
        state
            .groups
            .get(group)
            .map(|(_, channels)| channels.clone())
            .ok_or_else(|| DeliveryError::DestinationNotFound(group.clone()))
    }

    async fn create_channel(
        &self,
        group: &GroupId,
        name: &str,
    ) -> Result<ChannelInfo, DeliveryError> {
        // Let concurrent branches interleave here, as a real HTTP call would.
        tokio::task::yield_now().await;
        if self.fail_create {
            return Err(DeliveryError::Transport("missing permissions".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let channel = ChannelInfo {
            id: ChannelId(format!("created-{}", state.next_id)),
            name: name.to_string(),
            text_capable: true,
        };
        state.created.push((group.clone(), name.to_string()));
        state
            .groups
            .get_mut(group)
            .ok_or_else(|| DeliveryError::DestinationNotFound(group.clone()))?
            .1
            .push(channel.clone());
        Ok(channel)
    }

    async fn send(&self, channel: &MirrorChannel, unit: &OutboundUnit) -> Result<(), DeliveryError> {
        if self.yield_in_send {
            tokio::task::yield_now().await;
        }
        if self.fail_sends {
            return Err(DeliveryError::SendFailed("rate limited".to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .sent
            .push((channel.id.clone(), unit.clone()));
        Ok(())
    }
}

fn dispatcher(raw: serde_json::Value) -> Dispatcher {
    Dispatcher::new(&validate(&raw).unwrap())
}

fn simple_rule(options: serde_json::Value) -> serde_json::Value {
    json!({
        "token": "t",
        "redirects": [{ "sources": ["A"], "destinations": ["G1"], "options": options }]
    })
}

fn message(channel: &str, content: &str) -> InboundMessage {
    InboundMessage {
        channel_id: ChannelId::from(channel),
        channel_name: "general".to_string(),
        guild_id: Some(GroupId::from("G0")),
        guild_name: "Guild".to_string(),
        author: "alice".to_string(),
        content: content.to_string(),
        attachments: Vec::new(),
        embeds: Vec::new(),
    }
}

#[tokio::test]
async fn unmatched_channel_sends_nothing() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(simple_rule(json!({})));

    let report = dispatcher.handle(&transport, &message("Z", "hello")).await;

    assert!(report.branches.is_empty());
    assert!(transport.sent().is_empty());
    assert!(transport.created().is_empty());
    assert!(!dispatcher.is_source(&ChannelId::from("Z")));
    assert!(dispatcher.is_source(&ChannelId::from("A")));
}

#[tokio::test]
async fn creates_mirror_once_and_reuses_it() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(simple_rule(json!({})));

    dispatcher.handle(&transport, &message("A", "first")).await;
    dispatcher.handle(&transport, &message("A", "second")).await;

    let created = transport.created();
    assert_eq!(created, vec![(GroupId::from("G1"), "copy-general".to_string())]);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(id, _)| id == &ChannelId::from("created-1")));
}

#[tokio::test]
async fn existing_mirror_is_matched_case_insensitively() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    transport.add_channel("G1", "m1", "Copy-General", true);
    let dispatcher = dispatcher(simple_rule(json!({})));

    let report = dispatcher.handle(&transport, &message("A", "hi")).await;

    assert!(transport.created().is_empty());
    assert_eq!(report.units_sent(), 1);
    assert_eq!(transport.sent()[0].0, ChannelId::from("m1"));
}

#[tokio::test]
async fn concurrent_branches_to_same_group_create_one_channel() {
    let raw = json!({
        "token": "t",
        "echoScope": "destination",
        "redirects": [
            { "sources": ["A"], "destinations": ["G1"] },
            { "sources": ["A"], "destinations": ["G1"], "options": { "title": "Second" } }
        ]
    });
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(raw);

    let report = dispatcher.handle(&transport, &message("A", "hello")).await;

    assert_eq!(report.branches.len(), 2);
    assert_eq!(transport.created().len(), 1);
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn removes_everyone_in_transit() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(simple_rule(json!({ "removeEveryone": true })));

    dispatcher
        .handle(&transport, &message("A", "hello @everyone world"))
        .await;

    let sent = transport.sent();
    assert_eq!(sent[0].1, OutboundUnit::Text("\nhello  world".to_string()));
}

#[tokio::test]
async fn identical_consecutive_text_is_suppressed() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(simple_rule(json!({})));

    dispatcher.handle(&transport, &message("A", "same")).await;
    let second = dispatcher.handle(&transport, &message("A", "same")).await;
    dispatcher.handle(&transport, &message("A", "different")).await;

    match &second.branches[0].outcome {
        BranchOutcome::Delivered {
            units,
            text_suppressed,
            ..
        } => {
            assert_eq!(*units, 0);
            assert!(*text_suppressed);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let texts: Vec<OutboundUnit> = transport.sent().into_iter().map(|(_, u)| u).collect();
    assert_eq!(
        texts,
        vec![
            OutboundUnit::Text("\nsame".to_string()),
            OutboundUnit::Text("\ndifferent".to_string()),
        ]
    );
}

#[tokio::test]
async fn global_echo_scope_spans_destinations() {
    let raw = json!({
        "token": "t",
        "redirects": [{ "sources": ["A"], "destinations": ["G1", "G2"] }]
    });
    let transport = MemoryTransport::with_groups(&[("G1", "One"), ("G2", "Two")]);
    let dispatcher = dispatcher(raw);

    let report = dispatcher.handle(&transport, &message("A", "news")).await;

    assert_eq!(report.branches.len(), 2);
    assert_eq!(report.units_sent(), 1);
}

#[tokio::test]
async fn global_echo_scope_holds_while_sends_are_in_flight() {
    let raw = json!({
        "token": "t",
        "redirects": [{ "sources": ["A"], "destinations": ["G1", "G2"] }]
    });
    let transport = MemoryTransport {
        yield_in_send: true,
        ..MemoryTransport::with_groups(&[("G1", "One"), ("G2", "Two")])
    };
    transport.add_channel("G1", "m1", "copy-general", true);
    transport.add_channel("G2", "m2", "copy-general", true);
    let dispatcher = dispatcher(raw);

    let report = dispatcher.handle(&transport, &message("A", "news")).await;

    assert_eq!(report.units_sent(), 1);
    assert_eq!(transport.sent().len(), 1);
    let suppressed = report
        .branches
        .iter()
        .filter(|b| matches!(b.outcome, BranchOutcome::Delivered { text_suppressed: true, .. }))
        .count();
    assert_eq!(suppressed, 1);
}

#[tokio::test]
async fn failed_send_releases_claim_for_next_event() {
    let failing = MemoryTransport {
        fail_sends: true,
        yield_in_send: true,
        ..MemoryTransport::with_groups(&[("G1", "Mirror")])
    };
    failing.add_channel("G1", "m1", "copy-general", true);
    let dispatcher = dispatcher(simple_rule(json!({})));

    dispatcher.handle(&failing, &message("A", "first")).await;
    let report = dispatcher.handle(&failing, &message("A", "first")).await;

    match &report.branches[0].outcome {
        BranchOutcome::Delivered { text_suppressed, .. } => assert!(!*text_suppressed),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn destination_echo_scope_delivers_to_every_group() {
    let raw = json!({
        "token": "t",
        "echoScope": "destination",
        "redirects": [{ "sources": ["A"], "destinations": ["G1", "G2"] }]
    });
    let transport = MemoryTransport::with_groups(&[("G1", "One"), ("G2", "Two")]);
    let dispatcher = dispatcher(raw);

    let report = dispatcher.handle(&transport, &message("A", "news")).await;
    assert_eq!(report.units_sent(), 2);

    let again = dispatcher.handle(&transport, &message("A", "news")).await;
    assert_eq!(again.units_sent(), 0);
}

#[tokio::test]
async fn rich_embed_carries_attribution() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(simple_rule(json!({ "richEmbed": true, "includeSource": true })));

    dispatcher.handle(&transport, &message("A", "update")).await;

    let sent = transport.sent();
    let OutboundUnit::Embed(embed) = &sent[0].1 else {
        panic!("expected embed, got {:?}", sent[0].1);
    };
    assert_eq!(embed.description.as_deref(), Some("update"));
    assert_eq!(embed.color, Some(0x78FF));
    let field = &embed.fields[0];
    assert!(field.value.contains("alice"));
    assert!(field.value.contains("Guild/general"));
}

#[tokio::test]
async fn delivery_order_is_embeds_attachments_text() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(simple_rule(json!({})));

    let mut msg = message("A", "caption");
    msg.attachments = vec!["https://cdn/1.png".to_string()];
    msg.embeds = vec![InboundEmbed {
        kind: Some("rich".to_string()),
        description: Some("embedded".to_string()),
        ..InboundEmbed::default()
    }];

    dispatcher.handle(&transport, &msg).await;

    let kinds: Vec<&str> = transport.sent().iter().map(|(_, u)| u.kind()).collect();
    assert_eq!(kinds, vec!["embed", "attachment", "text"]);
}

#[tokio::test]
async fn attachments_and_embeds_are_never_suppressed() {
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(simple_rule(json!({})));

    let mut msg = message("A", "");
    msg.attachments = vec!["https://cdn/1.png".to_string()];

    dispatcher.handle(&transport, &msg).await;
    dispatcher.handle(&transport, &msg).await;

    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn unknown_group_is_skipped_silently() {
    let raw = json!({
        "token": "t",
        "redirects": [{ "sources": ["A"], "destinations": ["missing", "G1"] }]
    });
    let transport = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let dispatcher = dispatcher(raw);

    let report = dispatcher.handle(&transport, &message("A", "hi")).await;

    assert!(matches!(report.branches[0].outcome, BranchOutcome::GroupNotFound));
    assert!(matches!(
        report.branches[1].outcome,
        BranchOutcome::Delivered { units: 1, .. }
    ));
    assert_eq!(report.failures().count(), 0);
}

#[tokio::test]
async fn non_text_mirror_fails_only_its_branch() {
    let raw = json!({
        "token": "t",
        "echoScope": "destination",
        "redirects": [{ "sources": ["A"], "destinations": ["G1", "G2"] }]
    });
    let transport = MemoryTransport::with_groups(&[("G1", "Voice"), ("G2", "Text")]);
    transport.add_channel("G1", "v1", "copy-general", false);
    let dispatcher = dispatcher(raw);

    let report = dispatcher.handle(&transport, &message("A", "hi")).await;

    assert!(matches!(
        report.branches[0].outcome,
        BranchOutcome::Failed(DeliveryError::DestinationNotTextCapable { .. })
    ));
    assert_eq!(report.units_sent(), 1);
    assert_eq!(report.failures().count(), 1);
}

#[tokio::test]
async fn creation_failure_is_reported_per_branch() {
    let transport = MemoryTransport {
        fail_create: true,
        ..MemoryTransport::with_groups(&[("G1", "Mirror")])
    };
    let dispatcher = dispatcher(simple_rule(json!({})));

    let report = dispatcher.handle(&transport, &message("A", "hi")).await;

    match &report.branches[0].outcome {
        BranchOutcome::Failed(DeliveryError::ChannelCreationFailed { name, reason, .. }) => {
            assert_eq!(name, "copy-general");
            assert!(reason.contains("missing permissions"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn failed_send_is_not_recorded_as_echo() {
    let failing = MemoryTransport {
        fail_sends: true,
        ..MemoryTransport::with_groups(&[("G1", "Mirror")])
    };
    let dispatcher = dispatcher(simple_rule(json!({})));

    let report = dispatcher.handle(&failing, &message("A", "retry me")).await;
    assert_eq!(report.units_sent(), 0);

    let working = MemoryTransport::with_groups(&[("G1", "Mirror")]);
    let report = dispatcher.handle(&working, &message("A", "retry me")).await;
    assert_eq!(report.units_sent(), 1);
}

#[tokio::test]
async fn audit_flags_missing_groups_and_loops() {
    let raw = json!({
        "token": "t",
        "redirects": [
            { "sources": ["A"], "destinations": ["G1", "G9"] },
            { "sources": ["m1"], "destinations": ["G2"] }
        ]
    });
    let transport = MemoryTransport::with_groups(&[("G1", "One"), ("G2", "Two")]);
    transport.add_channel("G1", "m1", "copy-general", true);
    let dispatcher = dispatcher(raw);

    let audit = dispatcher.audit(&transport).await.unwrap();

    assert_eq!(audit.missing_groups, vec![GroupId::from("G9")]);
    assert_eq!(
        audit.loop_suspects,
        vec![(GroupId::from("G1"), ChannelId::from("m1"))]
    );
}

#[tokio::test]
async fn audit_checks_each_destination_once() {
    let raw = json!({
        "token": "t",
        "redirects": [
            { "sources": ["A"], "destinations": ["G9", "G1"] },
            { "sources": ["B", "m1"], "destinations": ["G9", "G1"] }
        ]
    });
    let transport = MemoryTransport::with_groups(&[("G1", "One")]);
    transport.add_channel("G1", "m1", "copy-general", true);
    let dispatcher = dispatcher(raw);

    let audit = dispatcher.audit(&transport).await.unwrap();

    assert_eq!(audit.missing_groups, vec![GroupId::from("G9")]);
    assert_eq!(
        audit.loop_suspects,
        vec![(GroupId::from("G1"), ChannelId::from("m1"))]
    );
}
