use crate::backend::DirectoryBackend;
use crate::common::error::{AppError, ServiceResult};
use crate::models::UserId;
use crate::models::groups::{GroupChat, GroupMember, GroupRole, validate_group_name};
use crate::models::viewers::Viewer;
use tracing::info;

pub async fn create<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    name: &str,
    description: Option<&str>,
    member_ids: &[UserId],
) -> ServiceResult<GroupChat> {
    let name = validate_group_name(name)?;
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    let group = backend
        .create_group(viewer.user_id, &name, description)
        .await?;
    for member_id in member_ids {
        if *member_id == viewer.user_id {
            continue;
        }
        match backend
            .add_group_member(group.group_id, *member_id, GroupRole::Member)
            .await
        {
            Ok(_) | Err(AppError::GroupsAlreadyMember) => {}
            Err(e) => return Err(e),
        }
    }
    info!(
        group_id = group.group_id,
        creator_id = viewer.user_id,
        "Created group chat"
    );
    Ok(group)
}

pub async fn members<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    group_id: i64,
) -> ServiceResult<Vec<GroupMember>> {
    backend.fetch_group(group_id).await?;
    let members = backend.fetch_group_members(group_id).await?;
    if !members.iter().any(|member| member.user_id == viewer.user_id) {
        return Err(AppError::GroupsNotMember);
    }
    Ok(members)
}

async fn require_admin<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    group_id: i64,
) -> ServiceResult<()> {
    let members = members(backend, viewer, group_id).await?;
    match members.iter().find(|member| member.user_id == viewer.user_id) {
        Some(member) if member.is_admin() => Ok(()),
        _ => Err(AppError::GroupsUnauthorized),
    }
}

pub async fn add_member<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    group_id: i64,
    user_id: UserId,
) -> ServiceResult<GroupMember> {
    require_admin(backend, viewer, group_id).await?;
    let member = backend
        .add_group_member(group_id, user_id, GroupRole::Member)
        .await?;
    info!(group_id, user_id, added_by = viewer.user_id, "Added group member");
    Ok(member)
}

pub async fn set_role<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    group_id: i64,
    user_id: UserId,
    role: GroupRole,
) -> ServiceResult<()> {
    require_admin(backend, viewer, group_id).await?;
    backend.set_group_member_role(group_id, user_id, role).await?;
    info!(group_id, user_id, role = role.as_str(), "Changed group member role");
    Ok(())
}

/// Members may remove themselves; removing anyone else takes an admin
pub async fn remove_member<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    group_id: i64,
    user_id: UserId,
) -> ServiceResult<()> {
    if user_id == viewer.user_id {
        members(backend, viewer, group_id).await?;
    } else {
        require_admin(backend, viewer, group_id).await?;
    }
    backend.remove_group_member(group_id, user_id).await?;
    info!(group_id, user_id, removed_by = viewer.user_id, "Removed group member");
    Ok(())
}

pub async fn leave<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    group_id: i64,
) -> ServiceResult<()> {
    remove_member(backend, viewer, group_id, viewer.user_id).await
}

/// Only the creator may delete a group; its messages go with it
pub async fn delete<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    group_id: i64,
) -> ServiceResult<()> {
    let group = backend.fetch_group(group_id).await?;
    if group.creator_id != viewer.user_id {
        return Err(AppError::GroupsUnauthorized);
    }
    backend.delete_group(group_id).await?;
    info!(group_id, deleted_by = viewer.user_id, "Deleted group chat");
    Ok(())
}
