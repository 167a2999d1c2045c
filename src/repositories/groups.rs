use crate::common::context::Context;
use crate::entities::groups::{GroupChat, GroupMember};
use crate::models::UserId;
use crate::models::containers::ContainerKind;
use crate::models::groups::{GroupRole, MembershipChange, check_admin_demotion};
use sqlx::{MySql, Transaction};

const TABLE_NAME: &str = "group_chats";
const READ_FIELDS: &str =
    "id, name, description, creator_id, last_message_id, created_at, updated_at";
const MEMBERS_TABLE_NAME: &str = "group_members";
const MEMBER_READ_FIELDS: &str = "group_id, user_id, role, joined_at";

pub async fn fetch_one<C: Context>(ctx: &C, group_id: i64) -> sqlx::Result<GroupChat> {
    const QUERY: &str = const_str::concat!(
        "SELECT ",
        READ_FIELDS,
        " FROM ",
        TABLE_NAME,
        " WHERE id = ?"
    );
    sqlx::query_as(QUERY)
        .bind(group_id)
        .fetch_one(ctx.db())
        .await
}

pub async fn create<C: Context>(
    ctx: &C,
    creator_id: UserId,
    name: &str,
    description: Option<&str>,
) -> sqlx::Result<GroupChat> {
    const INSERT_GROUP: &str = const_str::concat!(
        "INSERT INTO ",
        TABLE_NAME,
        " (name, description, creator_id, created_at, updated_at) ",
        "VALUES (?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)"
    );
    const INSERT_CREATOR: &str = const_str::concat!(
        "INSERT INTO ",
        MEMBERS_TABLE_NAME,
        " (group_id, user_id, role, joined_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)"
    );
    let mut tx = ctx.db().begin().await?;
    let group_id = sqlx::query(INSERT_GROUP)
        .bind(name)
        .bind(description)
        .bind(creator_id)
        .execute(&mut *tx)
        .await?
        .last_insert_id() as i64;
    sqlx::query(INSERT_CREATOR)
        .bind(group_id)
        .bind(creator_id)
        .bind(GroupRole::Admin.as_str())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    fetch_one(ctx, group_id).await
}

pub async fn fetch_members<C: Context>(ctx: &C, group_id: i64) -> sqlx::Result<Vec<GroupMember>> {
    const QUERY: &str = const_str::concat!(
        "SELECT ",
        MEMBER_READ_FIELDS,
        " FROM ",
        MEMBERS_TABLE_NAME,
        " WHERE group_id = ? ORDER BY joined_at ASC"
    );
    sqlx::query_as(QUERY)
        .bind(group_id)
        .fetch_all(ctx.db())
        .await
}

pub async fn add_member<C: Context>(
    ctx: &C,
    group_id: i64,
    user_id: UserId,
    role: GroupRole,
) -> sqlx::Result<GroupMember> {
    const INSERT_QUERY: &str = const_str::concat!(
        "INSERT INTO ",
        MEMBERS_TABLE_NAME,
        " (group_id, user_id, role, joined_at) VALUES (?, ?, ?, CURRENT_TIMESTAMP)"
    );
    const FETCH_QUERY: &str = const_str::concat!(
        "SELECT ",
        MEMBER_READ_FIELDS,
        " FROM ",
        MEMBERS_TABLE_NAME,
        " WHERE group_id = ? AND user_id = ?"
    );
    sqlx::query(INSERT_QUERY)
        .bind(group_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(ctx.db())
        .await?;
    sqlx::query_as(FETCH_QUERY)
        .bind(group_id)
        .bind(user_id)
        .fetch_one(ctx.db())
        .await
}

/// Locks the group's member rows and reads the admin count and the
/// member's current role, so the caller can decide before writing.
async fn lock_roles(
    tx: &mut Transaction<'_, MySql>,
    group_id: i64,
    user_id: UserId,
) -> sqlx::Result<(Option<GroupRole>, usize)> {
    const QUERY: &str = const_str::concat!(
        "SELECT user_id, role FROM ",
        MEMBERS_TABLE_NAME,
        " WHERE group_id = ? FOR UPDATE"
    );
    let rows: Vec<(i64, String)> = sqlx::query_as(QUERY)
        .bind(group_id)
        .fetch_all(&mut **tx)
        .await?;
    let mut current_role = None;
    let mut admin_count = 0;
    for (member_id, role) in rows {
        let role = GroupRole::from(role);
        if role == GroupRole::Admin {
            admin_count += 1;
        }
        if member_id == user_id {
            current_role = Some(role);
        }
    }
    Ok((current_role, admin_count))
}

pub async fn set_role<C: Context>(
    ctx: &C,
    group_id: i64,
    user_id: UserId,
    role: GroupRole,
) -> sqlx::Result<MembershipChange> {
    const QUERY: &str = const_str::concat!(
        "UPDATE ",
        MEMBERS_TABLE_NAME,
        " SET role = ? WHERE group_id = ? AND user_id = ?"
    );
    let mut tx = ctx.db().begin().await?;
    let (current_role, admin_count) = lock_roles(&mut tx, group_id, user_id).await?;
    let change = match role {
        GroupRole::Admin if current_role.is_some() => MembershipChange::Applied,
        GroupRole::Admin => MembershipChange::NotMember,
        GroupRole::Member => check_admin_demotion(current_role, admin_count),
    };
    if change != MembershipChange::Applied {
        tx.rollback().await?;
        return Ok(change);
    }
    sqlx::query(QUERY)
        .bind(role.as_str())
        .bind(group_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(change)
}

pub async fn remove_member<C: Context>(
    ctx: &C,
    group_id: i64,
    user_id: UserId,
) -> sqlx::Result<MembershipChange> {
    const QUERY: &str = const_str::concat!(
        "DELETE FROM ",
        MEMBERS_TABLE_NAME,
        " WHERE group_id = ? AND user_id = ?"
    );
    let mut tx = ctx.db().begin().await?;
    let (current_role, admin_count) = lock_roles(&mut tx, group_id, user_id).await?;
    let change = check_admin_demotion(current_role, admin_count);
    if change != MembershipChange::Applied {
        tx.rollback().await?;
        return Ok(change);
    }
    sqlx::query(QUERY)
        .bind(group_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(change)
}

/// Deletes the group with its members, messages and their read receipts.
/// Returns the number of deleted messages, or `None` if there was no such
/// group, in which case nothing is deleted.
pub async fn delete<C: Context>(ctx: &C, group_id: i64) -> sqlx::Result<Option<u64>> {
    const DELETE_READS: &str = const_str::concat!(
        "DELETE r FROM message_reads r",
        " JOIN messages m ON m.id = r.message_id",
        " WHERE m.container_kind = ? AND m.container_id = ?"
    );
    const DELETE_MESSAGES: &str =
        "DELETE FROM messages WHERE container_kind = ? AND container_id = ?";
    const DELETE_MEMBERS: &str = const_str::concat!(
        "DELETE FROM ",
        MEMBERS_TABLE_NAME,
        " WHERE group_id = ?"
    );
    const DELETE_GROUP: &str = const_str::concat!("DELETE FROM ", TABLE_NAME, " WHERE id = ?");
    let kind = ContainerKind::Group.as_str();

    let mut tx = ctx.db().begin().await?;
    let deleted = sqlx::query(DELETE_GROUP)
        .bind(group_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if deleted == 0 {
        tx.rollback().await?;
        return Ok(None);
    }
    sqlx::query(DELETE_MEMBERS)
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(DELETE_READS)
        .bind(kind)
        .bind(group_id)
        .execute(&mut *tx)
        .await?;
    let messages = sqlx::query(DELETE_MESSAGES)
        .bind(kind)
        .bind(group_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(Some(messages))
}
