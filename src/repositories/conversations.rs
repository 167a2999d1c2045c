use crate::common::context::Context;
use crate::entities::conversations::{Conversation, InboxRow, UnreadCount};
use crate::models::UserId;

const TABLE_NAME: &str = "conversations";
const READ_FIELDS: &str = "id, user_low, user_high, last_message_id, updated_at";

pub async fn fetch_one<C: Context>(ctx: &C, conversation_id: i64) -> sqlx::Result<Conversation> {
    const QUERY: &str = const_str::concat!(
        "SELECT ",
        READ_FIELDS,
        " FROM ",
        TABLE_NAME,
        " WHERE id = ?"
    );
    sqlx::query_as(QUERY)
        .bind(conversation_id)
        .fetch_one(ctx.db())
        .await
}

/// `(user_low, user_high)` is unique, so concurrent callers converge on one row
pub async fn get_or_create<C: Context>(
    ctx: &C,
    user_low: UserId,
    user_high: UserId,
) -> sqlx::Result<Conversation> {
    const QUERY: &str = const_str::concat!(
        "INSERT INTO ",
        TABLE_NAME,
        " (user_low, user_high, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP) ",
        "ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)"
    );
    let conversation_id = sqlx::query(QUERY)
        .bind(user_low)
        .bind(user_high)
        .execute(ctx.db())
        .await?
        .last_insert_id();
    fetch_one(ctx, conversation_id as i64).await
}

pub async fn fetch_inbox_rows<C: Context>(ctx: &C, user_id: UserId) -> sqlx::Result<Vec<InboxRow>> {
    const QUERY: &str = const_str::concat!(
        "SELECT 'direct' AS container_kind, c.id AS container_id, u.username AS title, ",
        "c.last_message_id, c.updated_at FROM conversations c ",
        "INNER JOIN users u ON u.id = IF(c.user_low = ?, c.user_high, c.user_low) ",
        "WHERE c.user_low = ? OR c.user_high = ? ",
        "UNION ALL ",
        "SELECT 'group', g.id, g.name, g.last_message_id, g.updated_at FROM group_chats g ",
        "INNER JOIN group_members gm ON gm.group_id = g.id WHERE gm.user_id = ? ",
        "UNION ALL ",
        "SELECT 'community', c.id, c.name, c.last_message_id, c.updated_at FROM communities c ",
        "INNER JOIN community_members cm ON cm.community_id = c.id WHERE cm.user_id = ?"
    );
    sqlx::query_as(QUERY)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(ctx.db())
        .await
}

pub async fn fetch_unread_counts<C: Context>(
    ctx: &C,
    user_id: UserId,
) -> sqlx::Result<Vec<UnreadCount>> {
    const QUERY: &str = const_str::concat!(
        "SELECT m.container_kind, m.container_id, COUNT(*) AS unread_count FROM messages m ",
        "LEFT JOIN message_reads r ON r.message_id = m.id AND r.viewer_id = ? ",
        "WHERE m.sender_id != ? AND (",
        "(m.container_kind = 'direct' AND m.read_at IS NULL AND m.container_id IN ",
        "(SELECT id FROM conversations WHERE user_low = ? OR user_high = ?)) ",
        "OR (m.container_kind = 'group' AND r.message_id IS NULL AND m.container_id IN ",
        "(SELECT group_id FROM group_members WHERE user_id = ?)) ",
        "OR (m.container_kind = 'community' AND r.message_id IS NULL AND m.container_id IN ",
        "(SELECT community_id FROM community_members WHERE user_id = ?))",
        ") GROUP BY m.container_kind, m.container_id"
    );
    sqlx::query_as(QUERY)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(ctx.db())
        .await
}
