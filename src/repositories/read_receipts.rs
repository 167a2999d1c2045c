use crate::common::context::Context;
use crate::entities::messages::ReadReceipt;
use crate::models::containers::ContainerRef;
use crate::models::{MessageId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{MySql, QueryBuilder};

pub async fn fetch_by_container<C: Context>(
    ctx: &C,
    container: ContainerRef,
) -> sqlx::Result<Vec<ReadReceipt>> {
    const QUERY: &str = const_str::concat!(
        "SELECT r.message_id, r.viewer_id FROM message_reads r ",
        "INNER JOIN messages m ON r.message_id = m.id ",
        "WHERE m.container_kind = ? AND m.container_id = ?"
    );
    sqlx::query_as(QUERY)
        .bind(container.kind.as_str())
        .bind(container.id)
        .fetch_all(ctx.db())
        .await
}

pub async fn fetch_by_message<C: Context>(
    ctx: &C,
    message_id: MessageId,
) -> sqlx::Result<Vec<ReadReceipt>> {
    const QUERY: &str = "SELECT message_id, viewer_id FROM message_reads WHERE message_id = ?";
    sqlx::query_as(QUERY)
        .bind(message_id)
        .fetch_all(ctx.db())
        .await
}

/// One row per (message, viewer); existing rows are left as they are
pub async fn create_many<C: Context>(
    ctx: &C,
    message_ids: &[MessageId],
    viewer_id: UserId,
    read_at: DateTime<Utc>,
) -> sqlx::Result<()> {
    if message_ids.is_empty() {
        return Ok(());
    }
    let mut query = QueryBuilder::<MySql>::new(
        "INSERT IGNORE INTO message_reads (message_id, viewer_id, read_at) ",
    );
    query.push_values(message_ids, |mut row, message_id| {
        row.push_bind(*message_id)
            .push_bind(viewer_id)
            .push_bind(read_at);
    });
    query.build().execute(ctx.db()).await?;
    Ok(())
}
