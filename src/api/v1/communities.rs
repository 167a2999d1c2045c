use crate::api::RequestContext;
use crate::common::error::ServiceResponse;
use crate::models::communities::Community;
use crate::usecases::communities;
use axum::Json;
use axum::extract::Path;

pub async fn join(
    ctx: RequestContext,
    Path(community_id): Path<i64>,
) -> ServiceResponse<Community> {
    let community = communities::join(&ctx.state, ctx.viewer, community_id).await?;
    Ok(Json(community))
}

pub async fn leave(ctx: RequestContext, Path(community_id): Path<i64>) -> ServiceResponse<()> {
    communities::leave(&ctx.state, ctx.viewer, community_id).await?;
    Ok(Json(()))
}
