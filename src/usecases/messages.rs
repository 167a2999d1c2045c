use crate::backend::Backend;
use crate::common::error::ServiceResult;
use crate::models::PostId;
use crate::models::containers::ContainerRef;
use crate::models::messages::{Message, NewMessage, RawMessage};
use crate::models::viewers::Viewer;
use crate::usecases::containers;
use tracing::info;

/// All messages of `container` in creation order
pub async fn load<B: Backend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    container: ContainerRef,
) -> ServiceResult<Vec<Message>> {
    containers::authorize(backend, viewer, container).await?;
    backend.fetch_messages(container).await
}

pub async fn send<B: Backend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    container: ContainerRef,
    content: Option<String>,
    shared_post_id: Option<PostId>,
) -> ServiceResult<RawMessage> {
    let message = NewMessage {
        container,
        sender_id: viewer.user_id,
        content,
        shared_post_id,
    }
    .validated()?;
    containers::authorize(backend, viewer, container).await?;

    let raw = backend.insert_message(message).await?;
    info!(
        message_id = raw.message_id,
        sender_id = raw.sender_id,
        container = %container,
        "Sent message"
    );
    Ok(raw)
}
