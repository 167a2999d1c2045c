use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
pub struct Message {
    pub id: u64,
    pub container_kind: String,
    pub container_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: Option<String>,
    pub shared_post_id: Option<u64>,
    pub shared_post_author: Option<String>,
    pub shared_post_caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
pub struct ReadReceipt {
    pub message_id: u64,
    pub viewer_id: i64,
}
