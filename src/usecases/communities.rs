use crate::backend::DirectoryBackend;
use crate::common::error::ServiceResult;
use crate::models::communities::Community;
use crate::models::viewers::Viewer;
use tracing::info;

pub async fn join<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    community_id: i64,
) -> ServiceResult<Community> {
    let community = backend.fetch_community(community_id).await?;
    backend.join_community(community_id, viewer.user_id).await?;
    info!(community_id, user_id = viewer.user_id, "Joined community");
    Ok(community)
}

pub async fn leave<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    community_id: i64,
) -> ServiceResult<()> {
    backend.fetch_community(community_id).await?;
    backend.leave_community(community_id, viewer.user_id).await?;
    info!(community_id, user_id = viewer.user_id, "Left community");
    Ok(())
}
