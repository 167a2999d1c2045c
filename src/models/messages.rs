use crate::common::error::{AppError, ServiceResult};
use crate::entities::messages::Message as MessageEntity;
use crate::models::containers::{ContainerKind, ContainerRef};
use crate::models::read_markers::ReadMarker;
use crate::models::{MessageId, PostId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedPost {
    pub post_id: PostId,
    pub author_name: String,
    pub caption: Option<String>,
}

/// A message joined with its sender and shared post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message_id: MessageId,
    pub container: ContainerRef,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: Option<String>,
    pub shared_post: Option<SharedPost>,
    pub created_at: DateTime<Utc>,
    pub read: ReadMarker,
}

impl Message {
    pub fn is_read_by(&self, viewer_id: UserId) -> bool {
        self.sender_id == viewer_id || self.read.is_read_by(viewer_id)
    }

    pub fn sort_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.message_id)
    }
}

/// The bare inserted row, as carried by push notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub message_id: MessageId,
    pub container: ContainerRef,
    pub sender_id: UserId,
    pub content: Option<String>,
    pub shared_post_id: Option<PostId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageArgs {
    pub content: Option<String>,
    pub shared_post_id: Option<PostId>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: Vec<MessageId>,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub container: ContainerRef,
    pub sender_id: UserId,
    pub content: Option<String>,
    pub shared_post_id: Option<PostId>,
}

impl NewMessage {
    /// Trims the text and checks it is sendable
    pub fn validated(mut self) -> ServiceResult<Self> {
        self.content = self
            .content
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty());
        match &self.content {
            None if self.shared_post_id.is_none() => Err(AppError::MessagesEmpty),
            Some(content) if content.chars().count() > MAX_MESSAGE_LENGTH => {
                Err(AppError::MessagesInvalidLength)
            }
            _ => Ok(self),
        }
    }
}

impl Message {
    /// `read_by` holds the receipts of this message; ignored for direct messages.
    pub fn from_entity(value: MessageEntity, read_by: BTreeSet<UserId>) -> ServiceResult<Self> {
        let kind = match ContainerKind::from_key(&value.container_kind) {
            Some(kind) => kind,
            None => {
                return crate::common::error::unexpected(anyhow::anyhow!(
                    "message {} has unknown container kind {}",
                    value.id,
                    value.container_kind
                ));
            }
        };
        let read = match kind.uses_receipts() {
            true => ReadMarker::Receipts { read_by },
            false => ReadMarker::Timestamp {
                read_at: value.read_at,
            },
        };
        let shared_post = value.shared_post_id.map(|post_id| SharedPost {
            post_id,
            author_name: value.shared_post_author.unwrap_or_default(),
            caption: value.shared_post_caption,
        });
        Ok(Self {
            message_id: value.id,
            container: ContainerRef {
                kind,
                id: value.container_id,
            },
            sender_id: value.sender_id,
            sender_name: value.sender_name,
            content: value.content,
            shared_post,
            created_at: value.created_at,
            read,
        })
    }
}
