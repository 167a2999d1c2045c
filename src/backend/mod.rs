//! The data store the synchronizer talks to.
//!
//! [`MessageBackend`] covers history queries, inserts, read-marking and
//! push-subscriptions; [`DirectoryBackend`] covers the containers
//! themselves. `AppState` implements both over MySQL and Redis,
//! [`memory::MemoryBackend`] implements both in process.

pub mod memory;
pub mod remote;

use crate::common::error::ServiceResult;
use crate::models::communities::Community;
use crate::models::containers::ContainerRef;
use crate::models::conversations::Conversation;
use crate::models::groups::{GroupChat, GroupMember, GroupRole};
use crate::models::inbox::InboxEntry;
use crate::models::messages::{Message, NewMessage, RawMessage};
use crate::models::{MessageId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

#[async_trait]
pub trait MessageBackend: Send + Sync {
    /// All messages of `container`, ordered by creation time ascending
    async fn fetch_messages(&self, container: ContainerRef) -> ServiceResult<Vec<Message>>;

    async fn fetch_message(&self, message_id: MessageId) -> ServiceResult<Message>;

    /// Stores the message, bumps the container's last message
    /// and notifies the container's subscribers.
    async fn insert_message(&self, message: NewMessage) -> ServiceResult<RawMessage>;

    /// Sets the read timestamp of direct messages that have none yet
    async fn mark_read_at(&self, message_ids: &[MessageId], read_at: DateTime<Utc>)
    -> ServiceResult<()>;

    /// Idempotently records `viewer_id` as a reader of each message
    async fn add_read_receipts(
        &self,
        message_ids: &[MessageId],
        viewer_id: UserId,
        read_at: DateTime<Utc>,
    ) -> ServiceResult<()>;

    async fn subscribe(&self, container: ContainerRef) -> ServiceResult<Subscription>;
}

#[async_trait]
pub trait DirectoryBackend: Send + Sync {
    async fn get_or_create_conversation(
        &self,
        user_id: UserId,
        peer_id: UserId,
    ) -> ServiceResult<Conversation>;

    async fn fetch_conversation(&self, conversation_id: i64) -> ServiceResult<Conversation>;

    async fn fetch_inbox(&self, user_id: UserId) -> ServiceResult<Vec<InboxEntry>>;

    /// Creates the group with `creator_id` as its first admin
    async fn create_group(
        &self,
        creator_id: UserId,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<GroupChat>;

    async fn fetch_group(&self, group_id: i64) -> ServiceResult<GroupChat>;

    async fn fetch_group_members(&self, group_id: i64) -> ServiceResult<Vec<GroupMember>>;

    async fn add_group_member(
        &self,
        group_id: i64,
        user_id: UserId,
        role: GroupRole,
    ) -> ServiceResult<GroupMember>;

    /// Fails with `GroupsLastAdmin` if the change would leave no admin
    async fn set_group_member_role(
        &self,
        group_id: i64,
        user_id: UserId,
        role: GroupRole,
    ) -> ServiceResult<()>;

    /// Fails with `GroupsLastAdmin` if the change would leave no admin
    async fn remove_group_member(&self, group_id: i64, user_id: UserId) -> ServiceResult<()>;

    async fn delete_group(&self, group_id: i64) -> ServiceResult<()>;

    async fn fetch_community(&self, community_id: i64) -> ServiceResult<Community>;

    async fn is_community_member(&self, community_id: i64, user_id: UserId)
    -> ServiceResult<bool>;

    async fn join_community(&self, community_id: i64, user_id: UserId) -> ServiceResult<()>;

    async fn leave_community(&self, community_id: i64, user_id: UserId) -> ServiceResult<()>;
}

pub trait Backend: MessageBackend + DirectoryBackend {}

impl<T: MessageBackend + DirectoryBackend> Backend for T {}

/// A live stream of rows inserted into one container.
///
/// Dropping the subscription closes it: the receiving end goes away and
/// any forwarding task is aborted.
#[derive(Debug)]
pub struct Subscription {
    container: ContainerRef,
    receiver: mpsc::UnboundedReceiver<RawMessage>,
    forwarder: Option<AbortHandle>,
}

impl Subscription {
    pub fn new(
        container: ContainerRef,
        receiver: mpsc::UnboundedReceiver<RawMessage>,
        forwarder: Option<AbortHandle>,
    ) -> Self {
        Self {
            container,
            receiver,
            forwarder,
        }
    }

    pub fn container(&self) -> ContainerRef {
        self.container
    }

    /// Next inserted row, or `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<RawMessage> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.receiver.close();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
