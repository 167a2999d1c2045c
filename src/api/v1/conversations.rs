use crate::api::RequestContext;
use crate::common::error::ServiceResponse;
use crate::models::conversations::{Conversation, OpenConversationArgs};
use crate::models::inbox::InboxEntry;
use crate::usecases::conversations;
use axum::Json;

pub async fn inbox(ctx: RequestContext) -> ServiceResponse<Vec<InboxEntry>> {
    let entries = conversations::inbox(&ctx.state, ctx.viewer).await?;
    Ok(Json(entries))
}

pub async fn open(
    ctx: RequestContext,
    Json(args): Json<OpenConversationArgs>,
) -> ServiceResponse<Conversation> {
    let conversation = conversations::get_or_create(&ctx.state, ctx.viewer, args.peer_id).await?;
    Ok(Json(conversation))
}
