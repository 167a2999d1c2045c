use crate::backend::DirectoryBackend;
use crate::common::error::{AppError, ServiceResult};
use crate::models::UserId;
use crate::models::containers::{ContainerKind, ContainerRef};
use crate::models::viewers::Viewer;

/// Checks that `viewer` may read from and post into `container`
pub async fn authorize<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    container: ContainerRef,
) -> ServiceResult<()> {
    match container.kind {
        ContainerKind::Direct => {
            let conversation = backend.fetch_conversation(container.id).await?;
            if !conversation.has_participant(viewer.user_id) {
                return Err(AppError::ConversationsNotParticipant);
            }
        }
        ContainerKind::Group => {
            backend.fetch_group(container.id).await?;
            let members = backend.fetch_group_members(container.id).await?;
            if !members.iter().any(|member| member.user_id == viewer.user_id) {
                return Err(AppError::GroupsNotMember);
            }
        }
        ContainerKind::Community => {
            if !backend
                .is_community_member(container.id, viewer.user_id)
                .await?
            {
                return Err(AppError::CommunitiesNotMember);
            }
        }
    }
    Ok(())
}

/// Everyone whose receipts count towards "seen" in `container`.
/// Only groups have a bounded audience; elsewhere this is empty.
pub async fn audience<B: DirectoryBackend + ?Sized>(
    backend: &B,
    container: ContainerRef,
) -> ServiceResult<Vec<UserId>> {
    match container.kind {
        ContainerKind::Group => Ok(backend
            .fetch_group_members(container.id)
            .await?
            .into_iter()
            .map(|member| member.user_id)
            .collect()),
        ContainerKind::Direct | ContainerKind::Community => Ok(vec![]),
    }
}
