/// Client integration tests
/// Exercise the messenger's state application end to end: optimistic
/// composition, poll reconciliation, read-marker advancement, and teardown
/// guarding. The backend URL points nowhere; every network call fails,
/// which is exactly the degraded path these tests rely on.
use chrono::Utc;
use cohub_core::storage::MemoryStorage;
use cohub_core::transcript::Transcript;
use cohub_core::{Config, DeliveryStatus, Message, Messenger, PartnerId};
use std::sync::Arc;
use std::time::Duration;

fn test_messenger() -> Messenger {
    let config = Config {
        viewer_id: Some("viewer".to_string()),
        backend_url: "http://127.0.0.1:9".to_string(),
        request_timeout: Duration::from_millis(200),
        ..Config::default()
    };
    Messenger::new(config, Arc::new(MemoryStorage::new())).unwrap()
}

fn partner() -> PartnerId {
    PartnerId::Direct("u2".to_string())
}

fn confirmed(sender: &str, content: &str) -> Message {
    Message::confirmed(sender, content, Utc::now(), None)
}

#[tokio::test]
async fn test_optimistic_send_is_visible_before_any_response() {
    let messenger = test_messenger();
    messenger
        .set_active_transcript(Transcript::new(partner(), "c1".to_string(), Vec::new()))
        .await;

    messenger.send_message("hi").await.unwrap();

    // Synchronously visible: transcript of length 1 with the viewer as
    // sender, long before the (doomed) network request resolves.
    let (active, messages) = messenger.active_transcript().await.unwrap();
    assert_eq!(active, partner());
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, "viewer");
    assert_eq!(messages[0].content, "hi");
}

#[tokio::test]
async fn test_failed_send_is_marked_not_removed() {
    let messenger = test_messenger();
    messenger
        .set_active_transcript(Transcript::new(partner(), "c1".to_string(), Vec::new()))
        .await;

    messenger.send_message("hi").await.unwrap();

    // The backend is unreachable, so the send task resolves to Failed.
    let mut status = DeliveryStatus::Pending;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (_, messages) = messenger.active_transcript().await.unwrap();
        status = messages[0].delivery;
        if status != DeliveryStatus::Pending {
            break;
        }
    }
    assert_eq!(status, DeliveryStatus::Failed);

    let (_, messages) = messenger.active_transcript().await.unwrap();
    assert_eq!(messages.len(), 1, "failed message must stay visible");
}

#[tokio::test]
async fn test_poll_reconciliation_replaces_and_advances_marker() {
    let messenger = test_messenger();
    let p = partner();
    assert!(messenger.read_marker(&p).is_none());

    let mut transcript = Transcript::new(p.clone(), "c1".to_string(), Vec::new());
    transcript.append_local(Message::local("viewer", "hi", None));
    let generation = messenger.set_active_transcript(transcript).await;

    let before = Utc::now();
    let server = vec![confirmed("viewer", "hi"), confirmed("u2", "hello back")];
    assert!(messenger.apply_poll(&p, generation, server).await);

    let (_, messages) = messenger.active_transcript().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].sender, "u2");

    let marker = messenger.read_marker(&p).expect("marker advanced");
    assert!(marker >= before);
}

#[tokio::test]
async fn test_poll_with_unchanged_count_applies_nothing() {
    let messenger = test_messenger();
    let p = partner();

    let mut transcript = Transcript::new(p.clone(), "c1".to_string(), Vec::new());
    transcript.append_local(Message::local("viewer", "hi", None));
    let generation = messenger.set_active_transcript(transcript).await;

    // Server already holds the optimistic message: same count, no replace,
    // no marker movement.
    assert!(!messenger.apply_poll(&p, generation, vec![confirmed("viewer", "hi")]).await);
    assert!(messenger.read_marker(&p).is_none());
}

#[tokio::test]
async fn test_stale_generation_poll_is_dropped() {
    let messenger = test_messenger();
    let p = partner();

    let generation = messenger
        .set_active_transcript(Transcript::new(p.clone(), "c1".to_string(), Vec::new()))
        .await;

    // The view is torn down while a poll is in flight
    messenger.close_conversation().await;

    let server = vec![confirmed("u2", "too late")];
    assert!(!messenger.apply_poll(&p, generation, server).await);
    assert!(messenger.active_transcript().await.is_none());
    assert!(messenger.read_marker(&p).is_none());
}

#[tokio::test]
async fn test_switching_conversations_invalidates_old_polls() {
    let messenger = test_messenger();
    let old = partner();
    let new = PartnerId::Direct("u3".to_string());

    let old_generation = messenger
        .set_active_transcript(Transcript::new(old.clone(), "c1".to_string(), Vec::new()))
        .await;
    messenger
        .set_active_transcript(Transcript::new(new.clone(), "c2".to_string(), Vec::new()))
        .await;

    // A result fetched for the previous conversation must not touch the
    // newly opened one.
    assert!(
        !messenger
            .apply_poll(&old, old_generation, vec![confirmed("u2", "old news")])
            .await
    );
    let (active, messages) = messenger.active_transcript().await.unwrap();
    assert_eq!(active, new);
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_admin_locked_group_refuses_sends() {
    let messenger = test_messenger();
    let mut transcript = Transcript::new(
        PartnerId::Group("g1".to_string()),
        "g1".to_string(),
        Vec::new(),
    );
    transcript.admin_locked = true;
    messenger.set_active_transcript(transcript).await;

    assert!(messenger.send_message("not allowed").await.is_err());
    let (_, messages) = messenger.active_transcript().await.unwrap();
    assert!(messages.is_empty());
}
