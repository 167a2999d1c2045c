use crate::entities::conversations::Conversation as Entity;
use crate::models::containers::ContainerRef;
use crate::models::{MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A 1:1 thread. Participants are stored ordered so a pair maps to one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub conversation_id: i64,
    pub participants: (UserId, UserId),
    pub last_message_id: Option<MessageId>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn container(&self) -> ContainerRef {
        ContainerRef::direct(self.conversation_id)
    }

    pub fn has_participant(&self, user_id: UserId) -> bool {
        self.participants.0 == user_id || self.participants.1 == user_id
    }

    pub fn peer_of(&self, user_id: UserId) -> Option<UserId> {
        match self.participants {
            (a, b) if a == user_id => Some(b),
            (a, b) if b == user_id => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenConversationArgs {
    pub peer_id: UserId,
}

pub fn participant_pair(a: UserId, b: UserId) -> (UserId, UserId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl From<Entity> for Conversation {
    fn from(value: Entity) -> Self {
        Self {
            conversation_id: value.id,
            participants: (value.user_low, value.user_high),
            last_message_id: value.last_message_id,
            updated_at: value.updated_at,
        }
    }
}
