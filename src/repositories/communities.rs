use crate::common::context::Context;
use crate::entities::communities::Community;
use crate::models::UserId;

const TABLE_NAME: &str = "communities";
const READ_FIELDS: &str = "id, name, description, last_message_id, updated_at";
const MEMBERS_TABLE_NAME: &str = "community_members";

pub async fn fetch_one<C: Context>(ctx: &C, community_id: i64) -> sqlx::Result<Community> {
    const QUERY: &str = const_str::concat!(
        "SELECT ",
        READ_FIELDS,
        " FROM ",
        TABLE_NAME,
        " WHERE id = ?"
    );
    sqlx::query_as(QUERY)
        .bind(community_id)
        .fetch_one(ctx.db())
        .await
}

pub async fn is_member<C: Context>(
    ctx: &C,
    community_id: i64,
    user_id: UserId,
) -> sqlx::Result<bool> {
    const QUERY: &str = const_str::concat!(
        "SELECT EXISTS(SELECT 1 FROM ",
        MEMBERS_TABLE_NAME,
        " WHERE community_id = ? AND user_id = ?)"
    );
    let exists: i64 = sqlx::query_scalar(QUERY)
        .bind(community_id)
        .bind(user_id)
        .fetch_one(ctx.db())
        .await?;
    Ok(exists != 0)
}

pub async fn join<C: Context>(ctx: &C, community_id: i64, user_id: UserId) -> sqlx::Result<()> {
    const QUERY: &str = const_str::concat!(
        "INSERT IGNORE INTO ",
        MEMBERS_TABLE_NAME,
        " (community_id, user_id, joined_at) VALUES (?, ?, CURRENT_TIMESTAMP)"
    );
    sqlx::query(QUERY)
        .bind(community_id)
        .bind(user_id)
        .execute(ctx.db())
        .await?;
    Ok(())
}

pub async fn leave<C: Context>(ctx: &C, community_id: i64, user_id: UserId) -> sqlx::Result<()> {
    const QUERY: &str = const_str::concat!(
        "DELETE FROM ",
        MEMBERS_TABLE_NAME,
        " WHERE community_id = ? AND user_id = ?"
    );
    sqlx::query(QUERY)
        .bind(community_id)
        .bind(user_id)
        .execute(ctx.db())
        .await?;
    Ok(())
}
