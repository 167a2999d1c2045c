use std::sync::Arc;
use std::time::Duration;
use travelshare_sync::backend::memory::MemoryBackend;
use travelshare_sync::backend::{DirectoryBackend, MessageBackend};
use travelshare_sync::common::error::AppError;
use travelshare_sync::common::session::SessionContext;
use travelshare_sync::models::containers::ContainerRef;
use travelshare_sync::models::groups::GroupRole;
use travelshare_sync::models::messages::{NewMessage, RawMessage};
use travelshare_sync::models::read_markers::{GroupReadPolicy, ReadMarker};
use travelshare_sync::models::viewers::Viewer;
use travelshare_sync::models::{MessageId, UserId};
use travelshare_sync::sync::subscriber::SubscriptionState;
use travelshare_sync::sync::view::ScrollAction;
use travelshare_sync::sync::{ConversationSync, SyncEvent, SyncOptions};

const ANA: UserId = 1;
const BRUNO: UserId = 2;
const CARLA: UserId = 3;

fn backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend.add_user(ANA, "ana");
    backend.add_user(BRUNO, "bruno");
    backend.add_user(CARLA, "carla");
    backend
}

fn sync_for(
    backend: &Arc<MemoryBackend>,
    user_id: UserId,
    options: SyncOptions,
) -> (ConversationSync<MemoryBackend>, SessionContext) {
    let session = SessionContext::signed_in(Viewer::new(user_id));
    let sync = ConversationSync::new(Arc::clone(backend), session.clone(), options);
    (sync, session)
}

async fn insert(
    backend: &MemoryBackend,
    container: ContainerRef,
    sender_id: UserId,
    text: &str,
) -> RawMessage {
    backend
        .insert_message(NewMessage {
            container,
            sender_id,
            content: Some(text.to_owned()),
            shared_post_id: None,
        })
        .await
        .unwrap()
}

fn texts(sync: &ConversationSync<MemoryBackend>) -> Vec<String> {
    sync.messages()
        .filter_map(|message| message.content.clone())
        .collect()
}

fn ids(sync: &ConversationSync<MemoryBackend>) -> Vec<MessageId> {
    sync.messages().map(|message| message.message_id).collect()
}

async fn assert_quiet(sync: &mut ConversationSync<MemoryBackend>) {
    let next = tokio::time::timeout(Duration::from_millis(50), sync.next_event()).await;
    assert!(next.is_err(), "expected no event, got {next:?}");
}

#[tokio::test]
async fn a_sent_message_shows_up_once_for_the_other_member() {
    let backend = backend();
    let community = backend.add_community("Lisbon locals", None);
    let container = community.container();
    backend.join_community(community.community_id, ANA).await.unwrap();
    backend.join_community(community.community_id, BRUNO).await.unwrap();

    let (mut ana, _) = sync_for(&backend, ANA, SyncOptions::default());
    let (mut bruno, _) = sync_for(&backend, BRUNO, SyncOptions::default());
    assert!(ana.activate(container).await.unwrap().is_empty());
    assert!(bruno.activate(container).await.unwrap().is_empty());

    let raw = ana.send(Some("hello".to_owned()), None).await.unwrap();

    match bruno.next_event().await {
        Some(SyncEvent::MessageReceived {
            message_id, patch, ..
        }) => {
            assert_eq!(message_id, raw.message_id);
            assert_eq!(patch.inserted, vec![raw.message_id]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(texts(&bruno), vec!["hello"]);
    let row = &bruno.view().rows()[0];
    assert_eq!(row.sender_name, "ana");
    assert!(!row.is_own);
    assert_quiet(&mut bruno).await;

    assert_eq!(
        ana.next_event().await,
        Some(SyncEvent::DuplicateIgnored {
            message_id: raw.message_id
        })
    );
    assert_eq!(texts(&ana), vec!["hello"]);
}

#[tokio::test]
async fn switching_containers_stops_the_previous_stream() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let group = backend.create_group(ANA, "Porto", None).await.unwrap();
    backend
        .add_group_member(group.group_id, BRUNO, GroupRole::Member)
        .await
        .unwrap();

    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(conversation.container()).await.unwrap();
    assert_eq!(backend.subscriber_count(conversation.container()), 1);

    sync.activate(group.container()).await.unwrap();
    assert_eq!(sync.active(), Some(group.container()));
    assert_eq!(sync.subscription_state(), SubscriptionState::Subscribed);
    assert_eq!(backend.subscriber_count(conversation.container()), 0);

    insert(&backend, conversation.container(), BRUNO, "still there?").await;
    assert_quiet(&mut sync).await;
    assert!(sync.log().is_empty());

    let raw = insert(&backend, group.container(), BRUNO, "tram 28 at noon").await;
    assert!(matches!(
        sync.next_event().await,
        Some(SyncEvent::MessageReceived { message_id, .. }) if message_id == raw.message_id
    ));
}

#[tokio::test]
async fn notifications_for_an_old_container_are_ignored() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let group = backend.create_group(ANA, "Porto", None).await.unwrap();
    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(group.container()).await.unwrap();

    let stray = insert(&backend, conversation.container(), BRUNO, "hey").await;
    assert_eq!(
        sync.handle_notification(stray.clone()).await,
        SyncEvent::ForeignIgnored {
            message_id: stray.message_id
        }
    );
    assert!(sync.log().is_empty());
}

#[tokio::test]
async fn redelivered_notifications_do_not_duplicate() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(conversation.container()).await.unwrap();

    let raw = insert(&backend, conversation.container(), BRUNO, "boarding now").await;
    assert!(matches!(
        sync.next_event().await,
        Some(SyncEvent::MessageReceived { .. })
    ));
    backend.redeliver(raw.message_id).unwrap();
    backend.redeliver(raw.message_id).unwrap();
    for _ in 0..2 {
        assert_eq!(
            sync.next_event().await,
            Some(SyncEvent::DuplicateIgnored {
                message_id: raw.message_id
            })
        );
    }
    assert_eq!(texts(&sync), vec!["boarding now"]);
    assert_eq!(sync.view().rows().len(), 1);
}

#[tokio::test]
async fn failed_refetches_are_dropped_until_the_next_reload() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();

    let raw = insert(&backend, container, BRUNO, "did you get the tickets?").await;
    backend.fail_fetches_of(raw.message_id);
    assert_eq!(
        sync.next_event().await,
        Some(SyncEvent::NotificationDropped {
            message_id: raw.message_id
        })
    );
    assert!(sync.log().is_empty());

    let patch = sync.reload().await.unwrap();
    assert_eq!(patch.inserted, vec![raw.message_id]);
    assert_eq!(texts(&sync), vec!["did you get the tickets?"]);
}

#[tokio::test]
async fn phantom_notifications_leave_the_log_alone() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    insert(&backend, container, BRUNO, "first").await;

    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();
    let before = ids(&sync);

    let phantom = RawMessage {
        message_id: 9_999,
        container,
        sender_id: BRUNO,
        content: Some("never stored".to_owned()),
        shared_post_id: None,
        created_at: chrono::Utc::now(),
    };
    backend.inject_notification(phantom);
    assert_eq!(
        sync.next_event().await,
        Some(SyncEvent::NotificationDropped { message_id: 9_999 })
    );
    assert_eq!(ids(&sync), before);
}

#[tokio::test]
async fn out_of_order_arrivals_stay_sorted() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();

    let first = insert(&backend, container, BRUNO, "one").await;
    let second = insert(&backend, container, BRUNO, "two").await;
    let third = insert(&backend, container, BRUNO, "three").await;

    sync.handle_notification(third.clone()).await;
    sync.handle_notification(first.clone()).await;
    sync.handle_notification(second.clone()).await;
    assert_eq!(texts(&sync), vec!["one", "two", "three"]);

    let created: Vec<_> = sync.messages().map(|message| message.created_at).collect();
    assert!(created.windows(2).all(|pair| pair[0] <= pair[1]));

    for _ in 0..3 {
        assert!(matches!(
            sync.next_event().await,
            Some(SyncEvent::DuplicateIgnored { .. })
        ));
    }
    assert_eq!(
        ids(&sync),
        vec![first.message_id, second.message_id, third.message_id]
    );
}

#[tokio::test]
async fn direct_messages_are_read_in_one_batch() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    let own = insert(&backend, container, ANA, "landing at 9").await;
    let incoming = [
        insert(&backend, container, BRUNO, "ok").await,
        insert(&backend, container, BRUNO, "I'll be at arrivals").await,
        insert(&backend, container, BRUNO, "gate B").await,
    ];

    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();

    let mut read_times = vec![];
    for raw in &incoming {
        let stored = backend.fetch_message(raw.message_id).await.unwrap();
        match stored.read {
            ReadMarker::Timestamp { read_at: Some(at) } => read_times.push(at),
            other => panic!("expected a read timestamp, got {other:?}"),
        }
    }
    assert!(read_times.windows(2).all(|pair| pair[0] == pair[1]));

    // the recipient has not opened the thread, so ana's own message stays unread
    let own = backend.fetch_message(own.message_id).await.unwrap();
    assert_eq!(own.read, ReadMarker::unread());
    assert!(!sync.view().rows()[0].seen);
}

#[tokio::test]
async fn read_state_never_regresses() {
    let backend = backend();
    let group = backend.create_group(ANA, "Madeira hike", None).await.unwrap();
    for user_id in [BRUNO, CARLA] {
        backend
            .add_group_member(group.group_id, user_id, GroupRole::Member)
            .await
            .unwrap();
    }
    let container = group.container();
    let raw = insert(&backend, container, ANA, "meet at 7").await;

    let (mut bruno, _) = sync_for(&backend, BRUNO, SyncOptions::default());
    bruno.activate(container).await.unwrap();
    let (mut carla, _) = sync_for(&backend, CARLA, SyncOptions::default());
    carla.activate(container).await.unwrap();
    bruno.reload().await.unwrap();

    let stored = backend.fetch_message(raw.message_id).await.unwrap();
    assert!(stored.is_read_by(BRUNO));
    assert!(stored.is_read_by(CARLA));

    // marking again through a fresh read keeps both readers
    backend
        .add_read_receipts(&[raw.message_id], BRUNO, chrono::Utc::now())
        .await
        .unwrap();
    let stored = backend.fetch_message(raw.message_id).await.unwrap();
    match stored.read {
        ReadMarker::Receipts { read_by } => {
            assert_eq!(read_by.into_iter().collect::<Vec<_>>(), vec![BRUNO, CARLA]);
        }
        other => panic!("expected receipts, got {other:?}"),
    }
}

#[tokio::test]
async fn seen_flags_follow_the_group_policy() {
    let backend = backend();
    let group = backend.create_group(ANA, "Azores", None).await.unwrap();
    for user_id in [BRUNO, CARLA] {
        backend
            .add_group_member(group.group_id, user_id, GroupRole::Member)
            .await
            .unwrap();
    }
    let container = group.container();
    insert(&backend, container, ANA, "ferry tickets booked").await;

    let all_members = SyncOptions {
        read_policy: GroupReadPolicy::AllMembers,
        ..Default::default()
    };
    let (mut strict, _) = sync_for(&backend, ANA, all_members);
    let (mut lenient, _) = sync_for(&backend, ANA, SyncOptions::default());

    let (mut bruno, _) = sync_for(&backend, BRUNO, SyncOptions::default());
    bruno.activate(container).await.unwrap();

    strict.activate(container).await.unwrap();
    lenient.activate(container).await.unwrap();
    assert!(!strict.view().rows()[0].seen);
    assert!(lenient.view().rows()[0].seen);

    let (mut carla, _) = sync_for(&backend, CARLA, SyncOptions::default());
    carla.activate(container).await.unwrap();
    let patch = strict.reload().await.unwrap();
    assert_eq!(patch.updated.len(), 1);
    assert!(strict.view().rows()[0].seen);
}

#[tokio::test]
async fn signing_out_closes_the_subscription() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    let (mut sync, session) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();
    insert(&backend, container, BRUNO, "are you up?").await;
    sync.reload().await.unwrap();

    session.sign_out();
    // the queued notification is never applied
    assert_eq!(sync.next_event().await, Some(SyncEvent::SignedOut));
    assert_eq!(sync.active(), None);
    assert!(sync.log().is_empty());
    assert_eq!(backend.subscriber_count(container), 0);
}

#[tokio::test]
async fn scrolled_up_viewers_keep_their_place() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    for n in 0..30 {
        insert(&backend, container, BRUNO, &format!("photo {n}")).await;
    }
    let options = SyncOptions {
        viewport_height: 10,
        ..Default::default()
    };
    let (mut sync, _) = sync_for(&backend, ANA, options);
    let patch = sync.activate(container).await.unwrap();
    assert_eq!(patch.scroll, ScrollAction::PinnedToBottom);
    assert!(sync.view().is_at_bottom());

    sync.view_mut().scroll_to(3);
    sync.view_mut().draft_mut().insert("looks gr");
    insert(&backend, container, BRUNO, "one more").await;
    match sync.next_event().await {
        Some(SyncEvent::MessageReceived { patch, .. }) => {
            assert_eq!(patch.scroll, ScrollAction::Unchanged);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(sync.view().viewport().offset, 3);
    assert_eq!(sync.view().draft().value(), "looks gr");

    sync.view_mut().scroll_to_bottom();
    insert(&backend, container, BRUNO, "and another").await;
    match sync.next_event().await {
        Some(SyncEvent::MessageReceived { patch, .. }) => {
            assert_eq!(patch.scroll, ScrollAction::PinnedToBottom);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(sync.view().is_at_bottom());
}

#[tokio::test]
async fn signing_in_as_an_outsider_closes_the_conversation() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    insert(&backend, container, BRUNO, "private to ana").await;
    let (mut sync, session) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();

    session.sign_in(Viewer::new(CARLA));
    let reply = insert(&backend, container, BRUNO, "secret reply").await;

    assert_eq!(
        sync.next_event().await,
        Some(SyncEvent::Deactivated {
            container,
            error: "conversations.not_participant",
        })
    );
    assert_eq!(sync.active(), None);
    assert!(sync.log().is_empty());
    assert!(sync.view().rows().is_empty());
    assert_eq!(backend.subscriber_count(container), 0);

    let stored = backend.fetch_message(reply.message_id).await.unwrap();
    assert_eq!(stored.read, ReadMarker::Timestamp { read_at: None });
}

#[tokio::test]
async fn a_queued_notification_is_not_applied_for_a_new_viewer() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    let (mut sync, session) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();

    let reply = insert(&backend, container, BRUNO, "secret reply").await;
    session.sign_in(Viewer::new(CARLA));
    assert!(matches!(
        sync.handle_notification(reply.clone()).await,
        SyncEvent::Deactivated { container: closed, .. } if closed == container
    ));
    assert!(sync.log().is_empty());

    let stored = backend.fetch_message(reply.message_id).await.unwrap();
    assert_eq!(stored.read, ReadMarker::Timestamp { read_at: None });
}

#[tokio::test]
async fn signing_in_as_the_other_participant_reloads_as_them() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    insert(&backend, container, ANA, "boarding now").await;
    let (mut sync, session) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();
    assert!(sync.view().rows()[0].is_own);

    session.sign_in(Viewer::new(BRUNO));
    match sync.next_event().await {
        Some(SyncEvent::Loaded { container: loaded, .. }) => assert_eq!(loaded, container),
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(sync.active(), Some(container));
    assert_eq!(texts(&sync), vec!["boarding now"]);
    assert!(!sync.view().rows()[0].is_own);
    assert!(sync.log().iter().all(|message| message.is_read_by(BRUNO)));
    assert_eq!(backend.subscriber_count(container), 1);
}

#[tokio::test]
async fn a_failed_reload_keeps_the_previous_messages() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    insert(&backend, container, BRUNO, "see you at the station").await;
    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();

    backend.fail_history_of(container);
    assert!(matches!(sync.reload().await, Err(AppError::Unexpected)));
    assert_eq!(texts(&sync), vec!["see you at the station"]);
    assert_eq!(sync.active(), Some(container));
    assert_eq!(sync.subscription_state(), SubscriptionState::Subscribed);
}

#[tokio::test]
async fn an_ended_stream_is_reported_once() {
    let backend = backend();
    let conversation = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let container = conversation.container();
    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(container).await.unwrap();

    backend.end_subscriptions(container);
    assert_eq!(
        sync.next_event().await,
        Some(SyncEvent::SubscriptionClosed { container })
    );
    assert_eq!(sync.subscription_state(), SubscriptionState::Unsubscribed);
    assert_quiet(&mut sync).await;
}

#[tokio::test]
async fn notifications_pointing_at_another_containers_row_are_ignored() {
    let backend = backend();
    let ours = backend.get_or_create_conversation(ANA, BRUNO).await.unwrap();
    let theirs = backend.get_or_create_conversation(BRUNO, CARLA).await.unwrap();
    let (mut sync, _) = sync_for(&backend, ANA, SyncOptions::default());
    sync.activate(ours.container()).await.unwrap();

    let secret = insert(&backend, theirs.container(), BRUNO, "don't tell ana").await;
    backend.inject_notification(RawMessage {
        container: ours.container(),
        ..secret.clone()
    });

    assert_eq!(
        sync.next_event().await,
        Some(SyncEvent::ForeignIgnored {
            message_id: secret.message_id
        })
    );
    assert!(sync.log().is_empty());
    let stored = backend.fetch_message(secret.message_id).await.unwrap();
    assert_eq!(stored.read, ReadMarker::Timestamp { read_at: None });
}
