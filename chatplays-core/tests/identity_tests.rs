// tests/identity_tests.rs
use std::sync::Arc;
use tokio::sync::Notify;

use chatplays_core::{
    models::{Identity, InboundChat},
    PipelineConfig,
};
use chatplays_core::test_utils::helpers::*;

const ALICE: &str = "did:plc:alice1234567";

fn alice() -> Identity {
    Identity {
        participant_id: ALICE.to_string(),
        handle: Some("alice.bsky.social".to_string()),
        display_name: Some("Alice".to_string()),
        avatar_url: Some("https://cdn.example/alice.jpg".to_string()),
    }
}

#[tokio::test]
async fn concurrent_messages_share_one_lookup() {
    let gate = Arc::new(Notify::new());
    let p = test_pipeline(
        PipelineConfig::default(),
        RecordingExecutor::new(),
        ScriptedResolver::new().then_ok(alice()).gated(gate.clone()),
    );

    for text in ["hi", "hello", "anyone?"] {
        p.service.ingest(InboundChat::new(ALICE, text));
        settle().await;
    }
    assert_eq!(p.resolver.calls(), 1);
    assert!(p.service.identity_cache().is_in_flight(ALICE));

    gate.notify_one();
    settle().await;
    assert!(!p.service.identity_cache().is_in_flight(ALICE));

    // every earlier line is patched
    let chat = p.service.snapshot().chat;
    assert_eq!(chat.len(), 3);
    assert!(chat.iter().all(|m| m.display_user == "Alice"));
    assert!(chat.iter().all(|m| m.handle.as_deref() == Some("alice.bsky.social")));

    // cached now, no further lookups
    p.service.ingest(InboundChat::new(ALICE, "again"));
    settle().await;
    assert_eq!(p.resolver.calls(), 1);
    assert_eq!(p.service.snapshot().chat[3].display_user, "Alice");
}

#[tokio::test]
async fn failed_or_empty_lookups_are_retried() {
    let p = test_pipeline(
        PipelineConfig::default(),
        RecordingExecutor::new(),
        ScriptedResolver::new().then_err("plc down").then_empty().then_ok(alice()),
    );

    p.service.ingest(InboundChat::new(ALICE, "one"));
    settle().await;
    assert_eq!(p.service.snapshot().chat[0].display_user, "alice123");

    p.service.ingest(InboundChat::new(ALICE, "two"));
    settle().await;
    p.service.ingest(InboundChat::new(ALICE, "three"));
    settle().await;

    assert_eq!(p.resolver.calls(), 3);
    assert!(p.service.snapshot().chat.iter().all(|m| m.display_user == "Alice"));
}

#[tokio::test]
async fn queue_items_use_the_handle() {
    let p = test_pipeline(
        PipelineConfig::default(),
        RecordingExecutor::new(),
        ScriptedResolver::new().then_ok(alice()),
    );

    p.service.ingest(InboundChat::new(ALICE, "up"));
    let before = p.service.snapshot();
    assert_eq!(before.queue[0].display_user, "alice123");
    assert_eq!(before.queue[0].handle, None);

    settle().await;
    let after = p.service.snapshot();
    assert_eq!(after.queue[0].display_user, "alice.bsky.social");
    assert_eq!(after.queue[0].avatar_url.as_deref(), Some("https://cdn.example/alice.jpg"));
}

#[tokio::test]
async fn unchanged_identity_is_not_rebroadcast() {
    let p = test_pipeline(
        PipelineConfig::default(),
        RecordingExecutor::new(),
        ScriptedResolver::new().then_ok(alice()),
    );
    let (_, _, mut rx) = p.service.subscribe(Some(64));

    p.service.ingest(InboundChat::new(ALICE, "hello"));
    settle().await;
    let mut updates = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        updates.push(snapshot);
    }
    // the new line, then the patch
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[1].chat[0].display_user, "Alice");

    p.service.resolve_identity(ALICE);
    settle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn record_hint_wins_and_skips_the_lookup() {
    let p = test_pipeline(
        PipelineConfig::default(),
        RecordingExecutor::new(),
        ScriptedResolver::new().then_ok(alice()),
    );
    let hint = Identity {
        display_name: Some("Ally".to_string()),
        ..Identity::new(ALICE)
    };

    p.service.ingest(InboundChat::new(ALICE, "hey").with_hint(hint));
    settle().await;

    assert_eq!(p.resolver.calls(), 0);
    assert_eq!(p.service.snapshot().chat[0].display_user, "Ally");
}

#[tokio::test]
async fn expired_identity_is_looked_up_again() {
    let p = test_pipeline(
        PipelineConfig::default(),
        RecordingExecutor::new(),
        ScriptedResolver::new()
            .then_ok(alice())
            .then_ok(Identity {
                display_name: Some("Alice B.".to_string()),
                ..alice()
            }),
    );

    p.service.ingest(InboundChat::new(ALICE, "one"));
    settle().await;
    p.clock.advance(chrono::Duration::minutes(16));
    p.service.ingest(InboundChat::new(ALICE, "two"));
    settle().await;

    assert_eq!(p.resolver.calls(), 2);
    assert!(p.service.snapshot().chat.iter().all(|m| m.display_user == "Alice B."));
}

#[tokio::test]
async fn refreshed_identity_without_a_handle_clears_it() {
    let p = test_pipeline(
        PipelineConfig::default(),
        RecordingExecutor::new(),
        ScriptedResolver::new()
            .then_ok(alice())
            .then_ok(Identity {
                handle: None,
                avatar_url: None,
                ..alice()
            }),
    );

    p.service.ingest(InboundChat::new(ALICE, "up"));
    settle().await;
    assert_eq!(p.service.snapshot().queue[0].display_user, "alice.bsky.social");

    p.clock.advance(chrono::Duration::minutes(16));
    p.service.ingest(InboundChat::new(ALICE, "down"));
    settle().await;

    let snapshot = p.service.snapshot();
    assert_eq!(p.resolver.calls(), 2);
    assert!(snapshot.chat.iter().all(|m| m.handle.is_none() && m.avatar_url.is_none()));
    assert!(snapshot.chat.iter().all(|m| m.display_user == "Alice"));
    assert!(snapshot.queue.iter().all(|i| i.handle.is_none() && i.display_user == "alice123"));
}
