use crate::entities::communities::Community as Entity;
use crate::models::MessageId;
use crate::models::containers::ContainerRef;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Community {
    pub community_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub last_message_id: Option<MessageId>,
    pub updated_at: DateTime<Utc>,
}

impl Community {
    pub fn container(&self) -> ContainerRef {
        ContainerRef::community(self.community_id)
    }
}

impl From<Entity> for Community {
    fn from(value: Entity) -> Self {
        Self {
            community_id: value.id,
            name: value.name,
            description: value.description,
            last_message_id: value.last_message_id,
            updated_at: value.updated_at,
        }
    }
}
