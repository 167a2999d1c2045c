//! The ordered, de-duplicated set of messages of the active container

use crate::models::messages::Message;
use crate::models::{MessageId, UserId};
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use std::collections::BTreeSet;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Messages keyed by id and iterated by `(created_at, id)`.
///
/// Arrival order never matters: a message merged late still lands in its
/// chronological slot, and merging the same id twice keeps one entry.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: HashMap<MessageId, Message>,
    order: BTreeSet<(DateTime<Utc>, MessageId)>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.order.clear();
    }

    pub fn get(&self, message_id: MessageId) -> Option<&Message> {
        self.messages.get(&message_id)
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.messages.contains_key(&message_id)
    }

    /// Discards everything and takes `messages` as the new contents
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.clear();
        for message in messages {
            self.merge(message);
        }
    }

    pub fn merge(&mut self, message: Message) -> MergeOutcome {
        match self.messages.get_mut(&message.message_id) {
            Some(existing) => {
                let mut changed = existing.read.merge(&message.read);
                if existing.content != message.content
                    || existing.shared_post != message.shared_post
                    || existing.sender_name != message.sender_name
                {
                    existing.content = message.content;
                    existing.shared_post = message.shared_post;
                    existing.sender_name = message.sender_name;
                    changed = true;
                }
                match changed {
                    true => MergeOutcome::Updated,
                    false => MergeOutcome::Unchanged,
                }
            }
            None => {
                self.order.insert(message.sort_key());
                self.messages.insert(message.message_id, message);
                MergeOutcome::Inserted
            }
        }
    }

    /// Records `viewer_id` as a reader of each listed message.
    /// Returns how many messages changed.
    pub fn record_read(
        &mut self,
        message_ids: &[MessageId],
        viewer_id: UserId,
        read_at: DateTime<Utc>,
    ) -> usize {
        let mut changed = 0;
        for message_id in message_ids {
            if let Some(message) = self.messages.get_mut(message_id) {
                if message.read.record(viewer_id, read_at) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Messages from others that `viewer_id` has not read, oldest first
    pub fn unread_from_others(&self, viewer_id: UserId) -> Vec<&Message> {
        self.iter()
            .filter(|message| !message.is_read_by(viewer_id))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.order
            .iter()
            .filter_map(|(_, message_id)| self.messages.get(message_id))
    }

    pub fn last(&self) -> Option<&Message> {
        self.order
            .last()
            .and_then(|(_, message_id)| self.messages.get(message_id))
    }
}
