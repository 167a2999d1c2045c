//! MySQL rows and Redis pub/sub behind the backend traits

use crate::backend::{DirectoryBackend, MessageBackend, Subscription};
use crate::common::error::{AppError, ServiceResult, unexpected};
use crate::common::state::AppState;
use crate::models::communities::Community;
use crate::models::containers::{ContainerKind, ContainerRef};
use crate::models::conversations::{Conversation, participant_pair};
use crate::models::groups::{GroupChat, GroupMember, GroupRole};
use crate::models::inbox::InboxEntry;
use crate::models::messages::{Message, NewMessage, RawMessage};
use crate::models::{MessageId, UserId};
use crate::repositories::{
    communities, conversations, groups, messages, notifications, read_receipts,
};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use hashbrown::HashMap;
use std::collections::BTreeSet;
use tracing::{info, warn};

#[async_trait]
impl MessageBackend for AppState {
    async fn fetch_messages(&self, container: ContainerRef) -> ServiceResult<Vec<Message>> {
        let rows = match messages::fetch_by_container(self, container).await {
            Ok(rows) => rows,
            Err(e) => return unexpected(e),
        };
        let mut receipts: HashMap<MessageId, BTreeSet<UserId>> = HashMap::new();
        if container.kind.uses_receipts() {
            match read_receipts::fetch_by_container(self, container).await {
                Ok(rows) => {
                    for receipt in rows {
                        receipts
                            .entry(receipt.message_id)
                            .or_default()
                            .insert(receipt.viewer_id);
                    }
                }
                Err(e) => return unexpected(e),
            }
        }
        rows.into_iter()
            .map(|row| {
                let read_by = receipts.remove(&row.id).unwrap_or_default();
                Message::from_entity(row, read_by)
            })
            .collect()
    }

    async fn fetch_message(&self, message_id: MessageId) -> ServiceResult<Message> {
        let row = match messages::fetch_one(self, message_id).await {
            Ok(row) => row,
            Err(sqlx::Error::RowNotFound) => return Err(AppError::MessagesNotFound),
            Err(e) => return unexpected(e),
        };
        let read_by = match ContainerKind::from_key(&row.container_kind) {
            Some(kind) if kind.uses_receipts() => {
                match read_receipts::fetch_by_message(self, message_id).await {
                    Ok(rows) => rows.into_iter().map(|receipt| receipt.viewer_id).collect(),
                    Err(e) => return unexpected(e),
                }
            }
            _ => BTreeSet::new(),
        };
        Message::from_entity(row, read_by)
    }

    async fn insert_message(&self, message: NewMessage) -> ServiceResult<RawMessage> {
        // DATETIME columns drop sub-second precision
        let created_at = Utc::now().trunc_subsecs(0);
        let message_id = match messages::create(self, &message, created_at).await {
            Ok(message_id) => message_id,
            Err(e) => return unexpected(e),
        };
        let raw = RawMessage {
            message_id,
            container: message.container,
            sender_id: message.sender_id,
            content: message.content,
            shared_post_id: message.shared_post_id,
            created_at,
        };
        // The row is stored; subscribers that miss it catch up on their next load
        match notifications::publish(self, &raw).await {
            Ok(receivers) => info!(
                message_id,
                container = %raw.container,
                receivers,
                "Published message notification"
            ),
            Err(e) => warn!(
                message_id,
                container = %raw.container,
                "Failed to publish message notification: {e}"
            ),
        }
        Ok(raw)
    }

    async fn mark_read_at(
        &self,
        message_ids: &[MessageId],
        read_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        match messages::mark_read_at(self, message_ids, read_at).await {
            Ok(()) => Ok(()),
            Err(e) => unexpected(e),
        }
    }

    async fn add_read_receipts(
        &self,
        message_ids: &[MessageId],
        viewer_id: UserId,
        read_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        match read_receipts::create_many(self, message_ids, viewer_id, read_at).await {
            Ok(()) => Ok(()),
            Err(e) => unexpected(e),
        }
    }

    async fn subscribe(&self, container: ContainerRef) -> ServiceResult<Subscription> {
        match notifications::subscribe(self, container).await {
            Ok(subscription) => Ok(subscription),
            Err(e) => unexpected(e),
        }
    }
}

#[async_trait]
impl DirectoryBackend for AppState {
    async fn get_or_create_conversation(
        &self,
        user_id: UserId,
        peer_id: UserId,
    ) -> ServiceResult<Conversation> {
        let (user_low, user_high) = participant_pair(user_id, peer_id);
        match conversations::get_or_create(self, user_low, user_high).await {
            Ok(conversation) => Ok(Conversation::from(conversation)),
            Err(e) => unexpected(e),
        }
    }

    async fn fetch_conversation(&self, conversation_id: i64) -> ServiceResult<Conversation> {
        match conversations::fetch_one(self, conversation_id).await {
            Ok(conversation) => Ok(Conversation::from(conversation)),
            Err(sqlx::Error::RowNotFound) => Err(AppError::ConversationsNotFound),
            Err(e) => unexpected(e),
        }
    }

    async fn fetch_inbox(&self, user_id: UserId) -> ServiceResult<Vec<InboxEntry>> {
        let rows = match conversations::fetch_inbox_rows(self, user_id).await {
            Ok(rows) => rows,
            Err(e) => return unexpected(e),
        };
        let unread_counts: HashMap<(String, i64), usize> =
            match conversations::fetch_unread_counts(self, user_id).await {
                Ok(counts) => counts
                    .into_iter()
                    .map(|count| {
                        let key = (count.container_kind, count.container_id);
                        (key, count.unread_count.max(0) as usize)
                    })
                    .collect(),
                Err(e) => return unexpected(e),
            };
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(kind) = ContainerKind::from_key(&row.container_kind) else {
                warn!(kind = %row.container_kind, "Skipping inbox row of unknown kind");
                continue;
            };
            let unread_count = unread_counts
                .get(&(row.container_kind, row.container_id))
                .copied()
                .unwrap_or(0);
            entries.push(InboxEntry {
                container: ContainerRef {
                    kind,
                    id: row.container_id,
                },
                title: row.title,
                last_message_id: row.last_message_id,
                last_activity: row.updated_at,
                unread_count,
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
        match groups::create(self, creator_id, name, description).await {
            Ok(group) => Ok(GroupChat::from(group)),
            Err(e) => unexpected(e),
        }
    }

    async fn fetch_group(&self, group_id: i64) -> ServiceResult<GroupChat> {
        match groups::fetch_one(self, group_id).await {
            Ok(group) => Ok(GroupChat::from(group)),
            Err(sqlx::Error::RowNotFound) => Err(AppError::GroupsNotFound),
            Err(e) => unexpected(e),
        }
    }

    async fn fetch_group_members(&self, group_id: i64) -> ServiceResult<Vec<GroupMember>> {
        match groups::fetch_members(self, group_id).await {
            Ok(members) => Ok(members.into_iter().map(GroupMember::from).collect()),
            Err(e) => unexpected(e),
        }
    }

    async fn add_group_member(
        &self,
        group_id: i64,
        user_id: UserId,
        role: GroupRole,
    ) -> ServiceResult<GroupMember> {
        match groups::add_member(self, group_id, user_id, role).await {
            Ok(member) => Ok(GroupMember::from(member)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::GroupsAlreadyMember)
            }
            Err(e) => unexpected(e),
        }
    }

    async fn set_group_member_role(
        &self,
        group_id: i64,
        user_id: UserId,
        role: GroupRole,
    ) -> ServiceResult<()> {
        match groups::set_role(self, group_id, user_id, role).await {
            Ok(change) => change.into_result(),
            Err(e) => unexpected(e),
        }
    }

    async fn remove_group_member(&self, group_id: i64, user_id: UserId) -> ServiceResult<()> {
        match groups::remove_member(self, group_id, user_id).await {
            Ok(change) => change.into_result(),
            Err(e) => unexpected(e),
        }
    }

    async fn delete_group(&self, group_id: i64) -> ServiceResult<()> {
        match groups::delete(self, group_id).await {
            Ok(Some(deleted)) => {
                info!(group_id, deleted, "Deleted group chat with its messages");
                Ok(())
            }
            Ok(None) => Err(AppError::GroupsNotFound),
            Err(e) => unexpected(e),
        }
    }

    async fn fetch_community(&self, community_id: i64) -> ServiceResult<Community> {
        match communities::fetch_one(self, community_id).await {
            Ok(community) => Ok(Community::from(community)),
            Err(sqlx::Error::RowNotFound) => Err(AppError::CommunitiesNotFound),
            Err(e) => unexpected(e),
        }
    }

    async fn is_community_member(
        &self,
        community_id: i64,
        user_id: UserId,
    ) -> ServiceResult<bool> {
        match communities::is_member(self, community_id, user_id).await {
            Ok(is_member) => Ok(is_member),
            Err(e) => unexpected(e),
        }
    }

    async fn join_community(&self, community_id: i64, user_id: UserId) -> ServiceResult<()> {
        match communities::join(self, community_id, user_id).await {
            Ok(()) => Ok(()),
            Err(e) => unexpected(e),
        }
    }

    async fn leave_community(&self, community_id: i64, user_id: UserId) -> ServiceResult<()> {
        match communities::leave(self, community_id, user_id).await {
            Ok(()) => Ok(()),
            Err(e) => unexpected(e),
        }
    }
}
