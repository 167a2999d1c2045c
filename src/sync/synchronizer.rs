//! Keeps one container's message list current for the signed-in viewer.
//!
//! A [`ConversationSync`] owns at most one live subscription. Activating a
//! container subscribes before history is loaded, so rows inserted while the
//! load is in flight are buffered and merged afterwards instead of lost.
//! Every notification is re-fetched by id and merged into the log, which
//! makes redelivery harmless.

use crate::backend::Backend;
use crate::common::error::{AppError, ServiceResult};
use crate::common::session::SessionContext;
use crate::models::containers::{ContainerKind, ContainerRef};
use crate::models::messages::{Message, RawMessage};
use crate::models::read_markers::GroupReadPolicy;
use crate::models::viewers::Viewer;
use crate::models::{MessageId, PostId};
use crate::sync::log::{MergeOutcome, MessageLog};
use crate::sync::subscriber::{LiveSubscriber, SubscriptionState};
use crate::sync::view::{DEFAULT_LINE_WIDTH, MessageListView, ViewPatch};
use crate::usecases::{containers, messages, read_state};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Copy, Clone)]
pub struct SyncOptions {
    pub read_policy: GroupReadPolicy,
    pub line_width: usize,
    pub viewport_height: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            read_policy: GroupReadPolicy::default(),
            line_width: DEFAULT_LINE_WIDTH,
            viewport_height: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// History was (re)loaded
    Loaded {
        container: ContainerRef,
        patch: ViewPatch,
    },
    MessageReceived {
        message_id: MessageId,
        outcome: MergeOutcome,
        patch: ViewPatch,
    },
    /// Already in the log, nothing was fetched
    DuplicateIgnored { message_id: MessageId },
    /// The row belongs to a container that is no longer active
    ForeignIgnored { message_id: MessageId },
    /// The row could not be fetched; it shows up on the next reload
    NotificationDropped { message_id: MessageId },
    SubscriptionClosed { container: ContainerRef },
    /// A different viewer signed in and could not reopen the container
    Deactivated {
        container: ContainerRef,
        error: &'static str,
    },
    SignedOut,
}

enum Wake {
    Notification(Option<RawMessage>),
    SessionChanged,
    SessionGone,
}

pub struct ConversationSync<B: Backend + ?Sized> {
    backend: Arc<B>,
    session: SessionContext,
    viewer_changes: watch::Receiver<Option<Viewer>>,
    options: SyncOptions,
    active: Option<ContainerRef>,
    loaded_for: Option<Viewer>,
    subscriber: LiveSubscriber,
    log: MessageLog,
    view: MessageListView,
}

impl<B: Backend + ?Sized> ConversationSync<B> {
    pub fn new(backend: Arc<B>, session: SessionContext, options: SyncOptions) -> Self {
        let viewer_changes = session.changes();
        Self {
            backend,
            session,
            viewer_changes,
            options,
            active: None,
            loaded_for: None,
            subscriber: LiveSubscriber::new(),
            log: MessageLog::new(),
            view: MessageListView::new(
                options.viewport_height,
                options.line_width,
                options.read_policy,
            ),
        }
    }

    pub fn active(&self) -> Option<ContainerRef> {
        self.active
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscriber.state()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.log.iter()
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn view(&self) -> &MessageListView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut MessageListView {
        &mut self.view
    }

    /// Switches to `container`: closes the previous subscription, opens the
    /// new one, then loads history into an emptied log.
    pub async fn activate(&mut self, container: ContainerRef) -> ServiceResult<ViewPatch> {
        let viewer = self.session.require_viewer()?;
        self.deactivate();

        self.subscriber.begin(container);
        match self.backend.subscribe(container).await {
            Ok(subscription) => {
                self.subscriber.established(subscription);
            }
            Err(e) => {
                self.subscriber.failed();
                error!(
                    container = %container,
                    viewer_id = viewer.user_id,
                    "Failed to subscribe to container"
                );
                return Err(e);
            }
        }
        self.active = Some(container);
        info!(container = %container, viewer_id = viewer.user_id, "Activated container");

        match self.reload().await {
            Ok(patch) => Ok(patch),
            Err(e) => {
                if e.is_access_denied() {
                    self.deactivate();
                }
                Err(e)
            }
        }
    }

    /// Closes the subscription and forgets the active container
    pub fn deactivate(&mut self) {
        self.subscriber.close();
        if let Some(container) = self.active.take() {
            debug!(container = %container, "Deactivated container");
        }
        self.loaded_for = None;
        self.log.clear();
        self.view.reset();
    }

    /// Replaces the log with freshly fetched history. On failure the
    /// previous log is kept and the error is returned, unless the log was
    /// loaded for another viewer, in which case the container is closed.
    pub async fn reload(&mut self) -> ServiceResult<ViewPatch> {
        let container = self.active.ok_or(AppError::SyncInactive)?;
        let viewer = self.session.require_viewer()?;

        let backend = Arc::clone(&self.backend);
        let history = match messages::load(&*backend, viewer, container).await {
            Ok(history) => history,
            Err(e) => {
                error!(
                    container = %container,
                    viewer_id = viewer.user_id,
                    error = e.code(),
                    "Failed to load messages"
                );
                if self.loaded_for.is_some_and(|loaded| loaded != viewer) {
                    self.deactivate();
                }
                return Err(e);
            }
        };
        self.refresh_audience(container).await;
        self.log.replace_all(history);
        self.loaded_for = Some(viewer);
        self.mark_unread_read(viewer).await;

        let patch = self.view.reconcile(&self.log, viewer.user_id);
        debug!(
            container = %container,
            messages = self.log.len(),
            inserted = patch.inserted.len(),
            "Loaded messages"
        );
        Ok(patch)
    }

    async fn refresh_audience(&mut self, container: ContainerRef) {
        if container.kind != ContainerKind::Group
            || self.options.read_policy != GroupReadPolicy::AllMembers
        {
            return;
        }
        match containers::audience(&*self.backend, container).await {
            Ok(members) => self.view.set_members(members),
            Err(e) => warn!(
                container = %container,
                error = e.code(),
                "Failed to fetch group members"
            ),
        }
    }

    async fn mark_unread_read(&mut self, viewer: Viewer) {
        let unread = self.log.unread_from_others(viewer.user_id);
        if unread.is_empty() {
            return;
        }
        match read_state::mark_read(&*self.backend, viewer, unread).await {
            Ok(update) => {
                self.log
                    .record_read(&update.message_ids, viewer.user_id, update.read_at);
            }
            Err(e) => warn!(
                viewer_id = viewer.user_id,
                error = e.code(),
                "Failed to mark messages as read"
            ),
        }
    }

    /// Sends into the active container. The stored row is merged right
    /// away; its notification is then ignored as a duplicate.
    pub async fn send(
        &mut self,
        content: Option<String>,
        shared_post_id: Option<PostId>,
    ) -> ServiceResult<RawMessage> {
        let container = self.active.ok_or(AppError::SyncInactive)?;
        let viewer = self.session.require_viewer()?;
        let raw =
            messages::send(&*self.backend, viewer, container, content, shared_post_id).await?;
        self.handle_notification(raw.clone()).await;
        Ok(raw)
    }

    /// Sends the draft. The draft is restored if sending fails.
    pub async fn send_draft(&mut self) -> ServiceResult<RawMessage> {
        let Some(text) = self.view.draft_mut().take() else {
            return Err(AppError::MessagesEmpty);
        };
        match self.send(Some(text.clone()), None).await {
            Ok(raw) => Ok(raw),
            Err(e) => {
                self.view.draft_mut().set(&text);
                Err(e)
            }
        }
    }

    /// Waits for the next thing that changes the synchronizer's state.
    /// Returns `None` once the session itself is gone.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        loop {
            let wake = match self.subscriber.active_mut() {
                Some(subscription) => tokio::select! {
                    biased;
                    changed = self.viewer_changes.changed() => match changed {
                        Ok(()) => Wake::SessionChanged,
                        Err(_) => Wake::SessionGone,
                    },
                    raw = subscription.recv() => Wake::Notification(raw),
                },
                None => match self.viewer_changes.changed().await {
                    Ok(()) => Wake::SessionChanged,
                    Err(_) => Wake::SessionGone,
                },
            };

            match wake {
                Wake::Notification(Some(raw)) => return Some(self.handle_notification(raw).await),
                Wake::Notification(None) => {
                    let container = self.subscriber.container();
                    self.subscriber.ended();
                    if let Some(container) = container {
                        warn!(container = %container, "Subscription stream ended");
                        return Some(SyncEvent::SubscriptionClosed { container });
                    }
                }
                Wake::SessionChanged => {
                    let viewer = *self.viewer_changes.borrow_and_update();
                    match viewer {
                        None => {
                            self.deactivate();
                            return Some(SyncEvent::SignedOut);
                        }
                        Some(viewer) => {
                            let Some(container) = self.active else {
                                continue;
                            };
                            if self.loaded_for != Some(viewer) {
                                return Some(self.reopen(container, viewer).await);
                            }
                            if let Ok(patch) = self.reload().await {
                                return Some(SyncEvent::Loaded { container, patch });
                            }
                        }
                    }
                }
                Wake::SessionGone => return None,
            }
        }
    }

    /// Closes the container and opens it again as `viewer`
    async fn reopen(&mut self, container: ContainerRef, viewer: Viewer) -> SyncEvent {
        info!(
            container = %container,
            viewer_id = viewer.user_id,
            "Viewer changed, reopening container"
        );
        self.deactivate();
        match self.activate(container).await {
            Ok(patch) => SyncEvent::Loaded { container, patch },
            Err(e) => {
                self.deactivate();
                warn!(
                    container = %container,
                    viewer_id = viewer.user_id,
                    error = e.code(),
                    "Failed to reopen container"
                );
                SyncEvent::Deactivated {
                    container,
                    error: e.code(),
                }
            }
        }
    }

    /// Applies one pushed row
    pub async fn handle_notification(&mut self, raw: RawMessage) -> SyncEvent {
        let message_id = raw.message_id;
        if self.active != Some(raw.container) {
            debug!(message_id, container = %raw.container, "Ignoring foreign notification");
            return SyncEvent::ForeignIgnored { message_id };
        }
        let Some(viewer) = self.session.current() else {
            self.deactivate();
            return SyncEvent::SignedOut;
        };
        if self.loaded_for != Some(viewer) {
            return self.reopen(raw.container, viewer).await;
        }
        if self.log.contains(message_id) {
            debug!(message_id, "Ignoring duplicate notification");
            return SyncEvent::DuplicateIgnored { message_id };
        }

        let message = match self.backend.fetch_message(message_id).await {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    message_id,
                    container = %raw.container,
                    error = e.code(),
                    "Dropping notification, failed to fetch message"
                );
                return SyncEvent::NotificationDropped { message_id };
            }
        };
        if message.container != raw.container {
            warn!(
                message_id,
                claimed = %raw.container,
                stored = %message.container,
                "Ignoring notification for a row of another container"
            );
            return SyncEvent::ForeignIgnored { message_id };
        }
        let from_other = message.sender_id != viewer.user_id;
        let outcome = self.log.merge(message);
        if from_other {
            self.mark_unread_read(viewer).await;
        }
        let patch = self.view.reconcile(&self.log, viewer.user_id);
        SyncEvent::MessageReceived {
            message_id,
            outcome,
            patch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::backend::{DirectoryBackend, MessageBackend};
    use crate::models::messages::NewMessage;

    async fn direct_pair() -> (Arc<MemoryBackend>, ContainerRef) {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_user(1, "ana");
        backend.add_user(2, "bruno");
        let conversation = backend.get_or_create_conversation(1, 2).await.unwrap();
        (backend, conversation.container())
    }

    #[tokio::test]
    async fn activating_requires_a_viewer() {
        let (backend, container) = direct_pair().await;
        let mut sync = ConversationSync::new(backend, SessionContext::signed_out(), SyncOptions::default());
        assert!(matches!(
            sync.activate(container).await,
            Err(AppError::SessionsSignedOut)
        ));
        assert_eq!(sync.subscription_state(), SubscriptionState::Unsubscribed);
    }

    #[tokio::test]
    async fn outsiders_are_not_left_subscribed() {
        let (backend, container) = direct_pair().await;
        let session = SessionContext::signed_in(Viewer::new(3));
        let mut sync = ConversationSync::new(backend.clone(), session, SyncOptions::default());
        assert!(matches!(
            sync.activate(container).await,
            Err(AppError::ConversationsNotParticipant)
        ));
        assert_eq!(sync.active(), None);
        assert_eq!(backend.subscriber_count(container), 0);
    }

    #[tokio::test]
    async fn loading_marks_incoming_messages_read() {
        let (backend, container) = direct_pair().await;
        let raw = backend
            .insert_message(NewMessage {
                container,
                sender_id: 2,
                content: Some("bom dia".to_owned()),
                shared_post_id: None,
            })
            .await
            .unwrap();

        let session = SessionContext::signed_in(Viewer::new(1));
        let mut sync = ConversationSync::new(backend.clone(), session, SyncOptions::default());
        let patch = sync.activate(container).await.unwrap();
        assert_eq!(patch.inserted, vec![raw.message_id]);
        assert!(sync.log().get(raw.message_id).unwrap().is_read_by(1));

        let stored = backend.fetch_message(raw.message_id).await.unwrap();
        assert!(stored.is_read_by(1));
    }

    #[tokio::test]
    async fn own_sends_are_merged_once() {
        let (backend, container) = direct_pair().await;
        let session = SessionContext::signed_in(Viewer::new(1));
        let mut sync = ConversationSync::new(backend, session, SyncOptions::default());
        sync.activate(container).await.unwrap();

        sync.view_mut().draft_mut().insert("on my way");
        let raw = sync.send_draft().await.unwrap();
        assert_eq!(sync.log().len(), 1);
        assert_eq!(sync.view().draft().value(), "");

        assert_eq!(
            sync.next_event().await,
            Some(SyncEvent::DuplicateIgnored {
                message_id: raw.message_id
            })
        );
        assert_eq!(sync.log().len(), 1);
    }

    #[tokio::test]
    async fn failed_sends_restore_the_draft() {
        let (backend, container) = direct_pair().await;
        let session = SessionContext::signed_in(Viewer::new(1));
        let mut sync = ConversationSync::new(backend, session, SyncOptions::default());
        sync.activate(container).await.unwrap();

        let long = "x".repeat(crate::models::messages::MAX_MESSAGE_LENGTH + 1);
        sync.view_mut().draft_mut().set(&long);
        assert!(matches!(
            sync.send_draft().await,
            Err(AppError::MessagesInvalidLength)
        ));
        assert_eq!(sync.view().draft().value(), long);
    }

    #[tokio::test]
    async fn sending_without_a_container_fails() {
        let (backend, _) = direct_pair().await;
        let session = SessionContext::signed_in(Viewer::new(1));
        let mut sync = ConversationSync::new(backend, session, SyncOptions::default());
        assert!(matches!(
            sync.send(Some("hi".to_owned()), None).await,
            Err(AppError::SyncInactive)
        ));
        assert!(matches!(sync.reload().await, Err(AppError::SyncInactive)));
    }
}
