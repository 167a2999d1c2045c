use crate::models::MessageId;
use crate::models::containers::ContainerRef;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One line of the viewer's conversation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub container: ContainerRef,
    pub title: String,
    pub last_message_id: Option<MessageId>,
    pub last_activity: DateTime<Utc>,
    pub unread_count: usize,
}
