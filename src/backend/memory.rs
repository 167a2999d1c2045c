//! In-process backend.
//!
//! Keeps every table in a single mutex so membership checks and updates are
//! atomic, and fans inserts out to subscribers synchronously. Timestamps come
//! from a logical clock that advances one second per write, which keeps
//! ordering deterministic.

use crate::backend::{DirectoryBackend, MessageBackend, Subscription};
use crate::common::error::{AppError, ServiceResult};
use crate::models::communities::Community;
use crate::models::containers::{ContainerKind, ContainerRef};
use crate::models::conversations::{Conversation, participant_pair};
use crate::models::groups::{
    GroupChat, GroupMember, GroupRole, MembershipChange, check_admin_demotion,
};
use crate::models::inbox::InboxEntry;
use crate::models::messages::{Message, NewMessage, RawMessage, SharedPost};
use crate::models::read_markers::ReadMarker;
use crate::models::{MessageId, PostId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;
use tracing::debug;

struct StoredMessage {
    raw: RawMessage,
    read: ReadMarker,
}

struct Inner {
    clock: DateTime<Utc>,
    next_id: i64,
    users: HashMap<UserId, String>,
    posts: HashMap<PostId, SharedPost>,
    messages: BTreeMap<MessageId, StoredMessage>,
    conversations: BTreeMap<i64, Conversation>,
    groups: BTreeMap<i64, GroupChat>,
    group_members: HashMap<i64, BTreeMap<UserId, GroupMember>>,
    communities: BTreeMap<i64, Community>,
    community_members: HashMap<i64, BTreeSet<UserId>>,
    subscribers: Vec<(ContainerRef, mpsc::UnboundedSender<RawMessage>)>,
    failing_fetches: HashSet<MessageId>,
    failing_histories: HashSet<ContainerRef>,
}

impl Inner {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += TimeDelta::seconds(1);
        self.clock
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn username(&self, user_id: UserId) -> String {
        self.users
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| format!("user-{user_id}"))
    }

    fn joined(&self, stored: &StoredMessage) -> Message {
        let raw = &stored.raw;
        Message {
            message_id: raw.message_id,
            container: raw.container,
            sender_id: raw.sender_id,
            sender_name: self.username(raw.sender_id),
            content: raw.content.clone(),
            shared_post: raw
                .shared_post_id
                .and_then(|post_id| self.posts.get(&post_id).cloned()),
            created_at: raw.created_at,
            read: stored.read.clone(),
        }
    }

    fn notify(&mut self, raw: &RawMessage) {
        self.subscribers.retain(|(_, sender)| !sender.is_closed());
        for (container, sender) in &self.subscribers {
            if *container == raw.container {
                let _ = sender.send(raw.clone());
            }
        }
    }

    fn bump_container(&mut self, container: ContainerRef, message_id: MessageId, at: DateTime<Utc>) {
        match container.kind {
            ContainerKind::Direct => {
                if let Some(conversation) = self.conversations.get_mut(&container.id) {
                    conversation.last_message_id = Some(message_id);
                    conversation.updated_at = at;
                }
            }
            ContainerKind::Group => {
                if let Some(group) = self.groups.get_mut(&container.id) {
                    group.last_message_id = Some(message_id);
                    group.updated_at = at;
                }
            }
            ContainerKind::Community => {
                if let Some(community) = self.communities.get_mut(&container.id) {
                    community.last_message_id = Some(message_id);
                    community.updated_at = at;
                }
            }
        }
    }

    fn admin_count(&self, group_id: i64) -> usize {
        self.group_members
            .get(&group_id)
            .map(|members| members.values().filter(|m| m.is_admin()).count())
            .unwrap_or(0)
    }

    fn member_role(&self, group_id: i64, user_id: UserId) -> Option<GroupRole> {
        self.group_members
            .get(&group_id)
            .and_then(|members| members.get(&user_id))
            .map(|member| member.role)
    }

    fn unread_count(&self, container: ContainerRef, user_id: UserId) -> usize {
        self.messages
            .values()
            .filter(|stored| stored.raw.container == container)
            .filter(|stored| stored.raw.sender_id != user_id)
            .filter(|stored| !stored.read.is_read_by(user_id))
            .count()
    }
}

pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let epoch = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            inner: Mutex::new(Inner {
                clock: epoch,
                next_id: 0,
                users: HashMap::new(),
                posts: HashMap::new(),
                messages: BTreeMap::new(),
                conversations: BTreeMap::new(),
                groups: BTreeMap::new(),
                group_members: HashMap::new(),
                communities: BTreeMap::new(),
                community_members: HashMap::new(),
                subscribers: vec![],
                failing_fetches: HashSet::new(),
                failing_histories: HashSet::new(),
            }),
        }
    }

    pub fn add_user(&self, user_id: UserId, username: &str) {
        self.inner.lock().users.insert(user_id, username.to_owned());
    }

    pub fn add_post(&self, post: SharedPost) {
        self.inner.lock().posts.insert(post.post_id, post);
    }

    pub fn add_community(&self, name: &str, description: Option<&str>) -> Community {
        let mut inner = self.inner.lock();
        let community_id = inner.next_id();
        let updated_at = inner.tick();
        let community = Community {
            community_id,
            name: name.to_owned(),
            description: description.map(str::to_owned),
            last_message_id: None,
            updated_at,
        };
        inner.communities.insert(community_id, community.clone());
        inner.community_members.insert(community_id, BTreeSet::new());
        community
    }

    /// Pushes `raw` to the container's subscribers without storing it,
    /// so any follow-up fetch of the row fails.
    pub fn inject_notification(&self, raw: RawMessage) {
        self.inner.lock().notify(&raw);
    }

    /// Delivers the notification of an already stored message again
    pub fn redeliver(&self, message_id: MessageId) -> ServiceResult<()> {
        let mut inner = self.inner.lock();
        let raw = match inner.messages.get(&message_id) {
            Some(stored) => stored.raw.clone(),
            None => return Err(AppError::MessagesNotFound),
        };
        inner.notify(&raw);
        Ok(())
    }

    /// Makes every future `fetch_message` of `message_id` fail
    pub fn fail_fetches_of(&self, message_id: MessageId) {
        self.inner.lock().failing_fetches.insert(message_id);
    }

    /// Makes every future `fetch_messages` of `container` fail
    pub fn fail_history_of(&self, container: ContainerRef) {
        self.inner.lock().failing_histories.insert(container);
    }

    /// Drops the senders of every subscription to `container`, which ends
    /// those streams.
    pub fn end_subscriptions(&self, container: ContainerRef) {
        self.inner
            .lock()
            .subscribers
            .retain(|(subscribed, _)| *subscribed != container);
    }

    pub fn subscriber_count(&self, container: ContainerRef) -> usize {
        self.inner
            .lock()
            .subscribers
            .iter()
            .filter(|(subscribed, sender)| *subscribed == container && !sender.is_closed())
            .count()
    }
}

#[async_trait]
impl MessageBackend for MemoryBackend {
    async fn fetch_messages(&self, container: ContainerRef) -> ServiceResult<Vec<Message>> {
        let inner = self.inner.lock();
        if inner.failing_histories.contains(&container) {
            return Err(AppError::Unexpected);
        }
        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|stored| stored.raw.container == container)
            .map(|stored| inner.joined(stored))
            .collect();
        messages.sort_by_key(Message::sort_key);
        Ok(messages)
    }

    async fn fetch_message(&self, message_id: MessageId) -> ServiceResult<Message> {
        let inner = self.inner.lock();
        if inner.failing_fetches.contains(&message_id) {
            return Err(AppError::Unexpected);
        }
        match inner.messages.get(&message_id) {
            Some(stored) => Ok(inner.joined(stored)),
            None => Err(AppError::MessagesNotFound),
        }
    }

    async fn insert_message(&self, message: NewMessage) -> ServiceResult<RawMessage> {
        let mut inner = self.inner.lock();
        let message_id = inner.next_id() as MessageId;
        let created_at = inner.tick();
        let raw = RawMessage {
            message_id,
            container: message.container,
            sender_id: message.sender_id,
            content: message.content,
            shared_post_id: message.shared_post_id,
            created_at,
        };
        let read = match message.container.kind.uses_receipts() {
            true => ReadMarker::no_receipts(),
            false => ReadMarker::unread(),
        };
        inner.messages.insert(
            message_id,
            StoredMessage {
                raw: raw.clone(),
                read,
            },
        );
        inner.bump_container(raw.container, message_id, created_at);
        inner.notify(&raw);
        debug!(message_id, container = %raw.container, "Stored message");
        Ok(raw)
    }

    async fn mark_read_at(
        &self,
        message_ids: &[MessageId],
        read_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut inner = self.inner.lock();
        for message_id in message_ids {
            if let Some(stored) = inner.messages.get_mut(message_id) {
                if let ReadMarker::Timestamp { .. } = stored.read {
                    stored.read.record(stored.raw.sender_id, read_at);
                }
            }
        }
        Ok(())
    }

    async fn add_read_receipts(
        &self,
        message_ids: &[MessageId],
        viewer_id: UserId,
        read_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let mut inner = self.inner.lock();
        for message_id in message_ids {
            if let Some(stored) = inner.messages.get_mut(message_id) {
                if let ReadMarker::Receipts { .. } = stored.read {
                    stored.read.record(viewer_id, read_at);
                }
            }
        }
        Ok(())
    }

    async fn subscribe(&self, container: ContainerRef) -> ServiceResult<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push((container, sender));
        Ok(Subscription::new(container, receiver, None))
    }
}

#[async_trait]
impl DirectoryBackend for MemoryBackend {
    async fn get_or_create_conversation(
        &self,
        user_id: UserId,
        peer_id: UserId,
    ) -> ServiceResult<Conversation> {
        let participants = participant_pair(user_id, peer_id);
        let mut inner = self.inner.lock();
        if let Some(existing) = inner
            .conversations
            .values()
            .find(|conversation| conversation.participants == participants)
        {
            return Ok(existing.clone());
        }
        let conversation_id = inner.next_id();
        let updated_at = inner.tick();
        let conversation = Conversation {
            conversation_id,
            participants,
            last_message_id: None,
            updated_at,
        };
        inner
            .conversations
            .insert(conversation_id, conversation.clone());
        Ok(conversation)
    }

    async fn fetch_conversation(&self, conversation_id: i64) -> ServiceResult<Conversation> {
        match self.inner.lock().conversations.get(&conversation_id) {
            Some(conversation) => Ok(conversation.clone()),
            None => Err(AppError::ConversationsNotFound),
        }
    }

    async fn fetch_inbox(&self, user_id: UserId) -> ServiceResult<Vec<InboxEntry>> {
        let inner = self.inner.lock();
        let mut entries = vec![];
        for conversation in inner.conversations.values() {
            let Some(peer_id) = conversation.peer_of(user_id) else {
                continue;
            };
            entries.push(InboxEntry {
                container: conversation.container(),
                title: inner.username(peer_id),
                last_message_id: conversation.last_message_id,
                last_activity: conversation.updated_at,
                unread_count: inner.unread_count(conversation.container(), user_id),
            });
        }
        for group in inner.groups.values() {
            if inner.member_role(group.group_id, user_id).is_none() {
                continue;
            }
            entries.push(InboxEntry {
                container: group.container(),
                title: group.name.clone(),
                last_message_id: group.last_message_id,
                last_activity: group.updated_at,
                unread_count: inner.unread_count(group.container(), user_id),
            });
        }
        for community in inner.communities.values() {
            let is_member = inner
                .community_members
                .get(&community.community_id)
                .is_some_and(|members| members.contains(&user_id));
            if !is_member {
                continue;
            }
            entries.push(InboxEntry {
                container: community.container(),
                title: community.name.clone(),
                last_message_id: community.last_message_id,
                last_activity: community.updated_at,
                unread_count: inner.unread_count(community.container(), user_id),
            });
        }
        Ok(entries)
    }

    async fn create_group(
        &self,
        creator_id: UserId,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<GroupChat> {
        let mut inner = self.inner.lock();
        let group_id = inner.next_id();
        let created_at = inner.tick();
        let group = GroupChat {
            group_id,
            name: name.to_owned(),
            description: description.map(str::to_owned),
            creator_id,
            last_message_id: None,
            created_at,
            updated_at: created_at,
        };
        let creator = GroupMember {
            group_id,
            user_id: creator_id,
            role: GroupRole::Admin,
            joined_at: created_at,
        };
        inner.groups.insert(group_id, group.clone());
        inner
            .group_members
            .insert(group_id, BTreeMap::from([(creator_id, creator)]));
        Ok(group)
    }

    async fn fetch_group(&self, group_id: i64) -> ServiceResult<GroupChat> {
        match self.inner.lock().groups.get(&group_id) {
            Some(group) => Ok(group.clone()),
            None => Err(AppError::GroupsNotFound),
        }
    }

    async fn fetch_group_members(&self, group_id: i64) -> ServiceResult<Vec<GroupMember>> {
        match self.inner.lock().group_members.get(&group_id) {
            Some(members) => Ok(members.values().cloned().collect()),
            None => Err(AppError::GroupsNotFound),
        }
    }

    async fn add_group_member(
        &self,
        group_id: i64,
        user_id: UserId,
        role: GroupRole,
    ) -> ServiceResult<GroupMember> {
        let mut inner = self.inner.lock();
        let joined_at = inner.tick();
        let Some(members) = inner.group_members.get_mut(&group_id) else {
            return Err(AppError::GroupsNotFound);
        };
        if members.contains_key(&user_id) {
            return Err(AppError::GroupsAlreadyMember);
        }
        let member = GroupMember {
            group_id,
            user_id,
            role,
            joined_at,
        };
        members.insert(user_id, member.clone());
        Ok(member)
    }

    async fn set_group_member_role(
        &self,
        group_id: i64,
        user_id: UserId,
        role: GroupRole,
    ) -> ServiceResult<()> {
        let mut inner = self.inner.lock();
        if !inner.groups.contains_key(&group_id) {
            return Err(AppError::GroupsNotFound);
        }
        let current_role = inner.member_role(group_id, user_id);
        let change = match role {
            GroupRole::Admin if current_role.is_some() => MembershipChange::Applied,
            GroupRole::Admin => MembershipChange::NotMember,
            GroupRole::Member => check_admin_demotion(current_role, inner.admin_count(group_id)),
        };
        if change == MembershipChange::Applied {
            if let Some(member) = inner
                .group_members
                .get_mut(&group_id)
                .and_then(|members| members.get_mut(&user_id))
            {
                member.role = role;
            }
        }
        change.into_result()
    }

    async fn remove_group_member(&self, group_id: i64, user_id: UserId) -> ServiceResult<()> {
        let mut inner = self.inner.lock();
        if !inner.groups.contains_key(&group_id) {
            return Err(AppError::GroupsNotFound);
        }
        let current_role = inner.member_role(group_id, user_id);
        let change = check_admin_demotion(current_role, inner.admin_count(group_id));
        if change == MembershipChange::Applied {
            if let Some(members) = inner.group_members.get_mut(&group_id) {
                members.remove(&user_id);
            }
        }
        change.into_result()
    }

    async fn delete_group(&self, group_id: i64) -> ServiceResult<()> {
        let mut inner = self.inner.lock();
        if inner.groups.remove(&group_id).is_none() {
            return Err(AppError::GroupsNotFound);
        }
        inner.group_members.remove(&group_id);
        let container = ContainerRef::group(group_id);
        inner
            .messages
            .retain(|_, stored| stored.raw.container != container);
        Ok(())
    }

    async fn fetch_community(&self, community_id: i64) -> ServiceResult<Community> {
        match self.inner.lock().communities.get(&community_id) {
            Some(community) => Ok(community.clone()),
            None => Err(AppError::CommunitiesNotFound),
        }
    }

    async fn is_community_member(
        &self,
        community_id: i64,
        user_id: UserId,
    ) -> ServiceResult<bool> {
        match self.inner.lock().community_members.get(&community_id) {
            Some(members) => Ok(members.contains(&user_id)),
            None => Err(AppError::CommunitiesNotFound),
        }
    }

    async fn join_community(&self, community_id: i64, user_id: UserId) -> ServiceResult<()> {
        match self.inner.lock().community_members.get_mut(&community_id) {
            Some(members) => {
                members.insert(user_id);
                Ok(())
            }
            None => Err(AppError::CommunitiesNotFound),
        }
    }

    async fn leave_community(&self, community_id: i64, user_id: UserId) -> ServiceResult<()> {
        match self.inner.lock().community_members.get_mut(&community_id) {
            Some(members) => {
                members.remove(&user_id);
                Ok(())
            }
            None => Err(AppError::CommunitiesNotFound),
        }
    }
}
