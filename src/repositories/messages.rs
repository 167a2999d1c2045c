use crate::common::context::Context;
use crate::entities::messages::Message;
use crate::models::MessageId;
use crate::models::containers::{ContainerKind, ContainerRef};
use crate::models::messages::NewMessage;
use chrono::{DateTime, Utc};
use sqlx::{MySql, QueryBuilder};

const READ_FIELDS: &str = const_str::concat!(
    "m.id, m.container_kind, m.container_id, m.sender_id, u.username AS sender_name, ",
    "m.content, m.shared_post_id, pu.username AS shared_post_author, ",
    "p.caption AS shared_post_caption, m.created_at, m.read_at"
);
const JOINED_TABLES: &str = const_str::concat!(
    "messages m INNER JOIN users u ON m.sender_id = u.id ",
    "LEFT JOIN posts p ON m.shared_post_id = p.id ",
    "LEFT JOIN users pu ON p.user_id = pu.id"
);

pub async fn fetch_by_container<C: Context>(
    ctx: &C,
    container: ContainerRef,
) -> sqlx::Result<Vec<Message>> {
    const QUERY: &str = const_str::concat!(
        "SELECT ",
        READ_FIELDS,
        " FROM ",
        JOINED_TABLES,
        " WHERE m.container_kind = ? AND m.container_id = ?",
        " ORDER BY m.created_at ASC, m.id ASC"
    );
    sqlx::query_as(QUERY)
        .bind(container.kind.as_str())
        .bind(container.id)
        .fetch_all(ctx.db())
        .await
}

pub async fn fetch_one<C: Context>(ctx: &C, message_id: MessageId) -> sqlx::Result<Message> {
    const QUERY: &str = const_str::concat!(
        "SELECT ",
        READ_FIELDS,
        " FROM ",
        JOINED_TABLES,
        " WHERE m.id = ?"
    );
    sqlx::query_as(QUERY)
        .bind(message_id)
        .fetch_one(ctx.db())
        .await
}

/// Inserts the message and bumps its container in one transaction
pub async fn create<C: Context>(
    ctx: &C,
    message: &NewMessage,
    created_at: DateTime<Utc>,
) -> sqlx::Result<MessageId> {
    const INSERT_QUERY: &str = const_str::concat!(
        "INSERT INTO messages ",
        "(container_kind, container_id, sender_id, content, shared_post_id, created_at) ",
        "VALUES (?, ?, ?, ?, ?, ?)"
    );
    const BUMP_CONVERSATION: &str =
        "UPDATE conversations SET last_message_id = ?, updated_at = ? WHERE id = ?";
    const BUMP_GROUP: &str =
        "UPDATE group_chats SET last_message_id = ?, updated_at = ? WHERE id = ?";
    const BUMP_COMMUNITY: &str =
        "UPDATE communities SET last_message_id = ?, updated_at = ? WHERE id = ?";

    let mut tx = ctx.db().begin().await?;
    let message_id = sqlx::query(INSERT_QUERY)
        .bind(message.container.kind.as_str())
        .bind(message.container.id)
        .bind(message.sender_id)
        .bind(message.content.as_deref())
        .bind(message.shared_post_id)
        .bind(created_at)
        .execute(&mut *tx)
        .await?
        .last_insert_id();

    let bump_query = match message.container.kind {
        ContainerKind::Direct => BUMP_CONVERSATION,
        ContainerKind::Group => BUMP_GROUP,
        ContainerKind::Community => BUMP_COMMUNITY,
    };
    sqlx::query(bump_query)
        .bind(message_id)
        .bind(created_at)
        .bind(message.container.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(message_id)
}

/// Only fills in timestamps that are still empty, so read state never regresses
pub async fn mark_read_at<C: Context>(
    ctx: &C,
    message_ids: &[MessageId],
    read_at: DateTime<Utc>,
) -> sqlx::Result<()> {
    if message_ids.is_empty() {
        return Ok(());
    }
    let mut query = QueryBuilder::<MySql>::new("UPDATE messages SET read_at = ");
    query.push_bind(read_at);
    query.push(" WHERE read_at IS NULL AND container_kind = ");
    query.push_bind(ContainerKind::Direct.as_str());
    query.push(" AND id IN (");
    let mut ids = query.separated(", ");
    for message_id in message_ids {
        ids.push_bind(*message_id);
    }
    ids.push_unseparated(")");
    query.build().execute(ctx.db()).await?;
    Ok(())
}
