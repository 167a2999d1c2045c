//! Follows one container for one viewer and logs every change to its view

use crate::common::init;
use crate::common::session::SessionContext;
use crate::models::viewers::Viewer;
use crate::settings::AppSettings;
use crate::sync::inbox::Inbox;
use crate::sync::{ConversationSync, SyncEvent, SyncOptions};
use crate::usecases::conversations;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

pub async fn serve(settings: &AppSettings) -> anyhow::Result<Infallible> {
    let Some(container) = settings.follow_container else {
        anyhow::bail!("FOLLOW_CONTAINER must be set for the follow component");
    };
    let Some(viewer_id) = settings.follow_viewer_id else {
        anyhow::bail!("FOLLOW_VIEWER_ID must be set for the follow component");
    };
    let viewer = Viewer::new(viewer_id);

    let state = Arc::new(init::initialize_state(settings).await?);
    let session = SessionContext::signed_in(viewer);
    let options = SyncOptions {
        read_policy: settings.group_read_policy,
        ..Default::default()
    };

    let mut inbox = Inbox::new(viewer_id);
    let entries = conversations::inbox(&*state, viewer)
        .await
        .map_err(|e| anyhow::Error::msg(e.code()))?;
    inbox.replace_all(entries);
    info!(
        viewer_id,
        containers = inbox.len(),
        unread = inbox.total_unread(),
        "Loaded inbox"
    );

    let mut sync = ConversationSync::new(state, session, options);
    let patch = sync
        .activate(container)
        .await
        .map_err(|e| anyhow::Error::msg(e.code()))?;
    inbox.mark_read(container);
    info!(
        container = %container,
        messages = patch.inserted.len(),
        "Following container"
    );

    loop {
        let Some(event) = sync.next_event().await else {
            anyhow::bail!("Session closed while following {container}");
        };
        match event {
            SyncEvent::MessageReceived {
                message_id, patch, ..
            } => {
                if let Some(message) = sync.log().get(message_id) {
                    inbox.record_message(message);
                    info!(
                        message_id,
                        sender = %message.sender_name,
                        content = message.content.as_deref().unwrap_or(""),
                        inserted = patch.inserted.len(),
                        updated = patch.updated.len(),
                        scroll = ?patch.scroll,
                        "Message received"
                    );
                }
                inbox.mark_read(container);
            }
            SyncEvent::Loaded { patch, .. } => {
                info!(
                    messages = sync.log().len(),
                    inserted = patch.inserted.len(),
                    "Reloaded container"
                );
            }
            SyncEvent::SubscriptionClosed { .. } => {
                anyhow::bail!("Subscription to {container} closed");
            }
            SyncEvent::Deactivated { error, .. } => {
                anyhow::bail!("Viewer {viewer_id} lost access to {container}: {error}");
            }
            SyncEvent::SignedOut => {
                anyhow::bail!("Viewer {viewer_id} was signed out");
            }
            SyncEvent::DuplicateIgnored { .. }
            | SyncEvent::ForeignIgnored { .. }
            | SyncEvent::NotificationDropped { .. } => {}
        }
    }
}
