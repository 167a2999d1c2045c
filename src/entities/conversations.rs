use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
pub struct Conversation {
    pub id: i64,
    pub user_low: i64,
    pub user_high: i64,
    pub last_message_id: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub struct InboxRow {
    pub container_kind: String,
    pub container_id: i64,
    pub title: String,
    pub last_message_id: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub struct UnreadCount {
    pub container_kind: String,
    pub container_id: i64,
    pub unread_count: i64,
}
