use crate::backend::DirectoryBackend;
use crate::common::error::{AppError, ServiceResult};
use crate::models::UserId;
use crate::models::conversations::Conversation;
use crate::models::inbox::InboxEntry;
use crate::models::viewers::Viewer;

/// The viewer's 1:1 conversation with `peer_id`, created on first use
pub async fn get_or_create<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    peer_id: UserId,
) -> ServiceResult<Conversation> {
    if peer_id == viewer.user_id {
        return Err(AppError::ConversationsSelfConversation);
    }
    backend
        .get_or_create_conversation(viewer.user_id, peer_id)
        .await
}

pub async fn fetch_one<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    conversation_id: i64,
) -> ServiceResult<Conversation> {
    let conversation = backend.fetch_conversation(conversation_id).await?;
    if !conversation.has_participant(viewer.user_id) {
        return Err(AppError::ConversationsNotParticipant);
    }
    Ok(conversation)
}

/// Every container the viewer takes part in, most recently active first
pub async fn inbox<B: DirectoryBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
) -> ServiceResult<Vec<InboxEntry>> {
    let mut entries = backend.fetch_inbox(viewer.user_id).await?;
    entries.sort_by(|a, b| {
        b.last_activity
            .cmp(&a.last_activity)
            .then_with(|| b.container.cmp(&a.container))
    });
    Ok(entries)
}
