use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub last_message_id: Option<u64>,
    pub updated_at: DateTime<Utc>,
}
