use crate::backend::MessageBackend;
use crate::common::error::ServiceResult;
use crate::models::MessageId;
use crate::models::containers::ContainerKind;
use crate::models::messages::Message;
use crate::models::viewers::Viewer;
use chrono::{DateTime, Utc};
use tracing::debug;

pub struct ReadUpdate {
    pub message_ids: Vec<MessageId>,
    pub read_at: DateTime<Utc>,
}

impl ReadUpdate {
    pub fn is_empty(&self) -> bool {
        self.message_ids.is_empty()
    }
}

/// Messages in `messages` that `viewer` received but has not read yet
pub fn unread_by<'a>(
    viewer: Viewer,
    messages: impl IntoIterator<Item = &'a Message>,
) -> Vec<&'a Message> {
    messages
        .into_iter()
        .filter(|message| !message.is_read_by(viewer.user_id))
        .collect()
}

/// Marks every message in `messages` sent by someone else as read by `viewer`.
///
/// Direct messages get a single batched timestamp update, group and
/// community messages get one idempotent receipt row per message.
pub async fn mark_read<'a, B: MessageBackend + ?Sized>(
    backend: &B,
    viewer: Viewer,
    messages: impl IntoIterator<Item = &'a Message>,
) -> ServiceResult<ReadUpdate> {
    let read_at = Utc::now();
    let mut direct_ids = vec![];
    let mut receipt_ids = vec![];
    for message in unread_by(viewer, messages) {
        match message.container.kind {
            ContainerKind::Direct => direct_ids.push(message.message_id),
            ContainerKind::Group | ContainerKind::Community => {
                receipt_ids.push(message.message_id)
            }
        }
    }

    if !direct_ids.is_empty() {
        backend.mark_read_at(&direct_ids, read_at).await?;
    }
    if !receipt_ids.is_empty() {
        backend
            .add_read_receipts(&receipt_ids, viewer.user_id, read_at)
            .await?;
    }

    let mut message_ids = direct_ids;
    message_ids.extend(receipt_ids);
    if !message_ids.is_empty() {
        debug!(
            viewer_id = viewer.user_id,
            count = message_ids.len(),
            "Marked messages read"
        );
    }
    Ok(ReadUpdate {
        message_ids,
        read_at,
    })
}
