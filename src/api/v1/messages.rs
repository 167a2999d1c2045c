use crate::api::RequestContext;
use crate::common::error::ServiceResponse;
use crate::models::containers::ContainerRef;
use crate::models::messages::{MarkReadResponse, Message, RawMessage, SendMessageArgs};
use crate::usecases::{messages, read_state};
use axum::Json;
use axum::extract::Path;

/// Full history; everything the viewer had not read yet is marked read
pub async fn history(
    ctx: RequestContext,
    Path(container): Path<String>,
) -> ServiceResponse<Vec<Message>> {
    let container = ContainerRef::from_key(&container)?;
    let mut history = messages::load(&ctx.state, ctx.viewer, container).await?;
    let update = read_state::mark_read(&ctx.state, ctx.viewer, &history).await?;
    for message in history
        .iter_mut()
        .filter(|message| update.message_ids.contains(&message.message_id))
    {
        message.read.record(ctx.viewer.user_id, update.read_at);
    }
    Ok(Json(history))
}

pub async fn send(
    ctx: RequestContext,
    Path(container): Path<String>,
    Json(args): Json<SendMessageArgs>,
) -> ServiceResponse<RawMessage> {
    let container = ContainerRef::from_key(&container)?;
    let raw = messages::send(
        &ctx.state,
        ctx.viewer,
        container,
        args.content,
        args.shared_post_id,
    )
    .await?;
    Ok(Json(raw))
}

pub async fn mark_read(
    ctx: RequestContext,
    Path(container): Path<String>,
) -> ServiceResponse<MarkReadResponse> {
    let container = ContainerRef::from_key(&container)?;
    let history = messages::load(&ctx.state, ctx.viewer, container).await?;
    let update = read_state::mark_read(&ctx.state, ctx.viewer, &history).await?;
    Ok(Json(MarkReadResponse {
        marked: update.message_ids,
        read_at: update.read_at,
    }))
}
