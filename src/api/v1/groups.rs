use crate::api::RequestContext;
use crate::common::error::ServiceResponse;
use crate::models::UserId;
use crate::models::groups::{AddMemberArgs, CreateGroupArgs, GroupChat, GroupMember, SetRoleArgs};
use crate::usecases::groups;
use axum::Json;
use axum::extract::Path;

pub async fn create(
    ctx: RequestContext,
    Json(args): Json<CreateGroupArgs>,
) -> ServiceResponse<GroupChat> {
    let group = groups::create(
        &ctx.state,
        ctx.viewer,
        &args.name,
        args.description.as_deref(),
        &args.member_ids,
    )
    .await?;
    Ok(Json(group))
}

pub async fn delete(ctx: RequestContext, Path(group_id): Path<i64>) -> ServiceResponse<()> {
    groups::delete(&ctx.state, ctx.viewer, group_id).await?;
    Ok(Json(()))
}

pub async fn members(
    ctx: RequestContext,
    Path(group_id): Path<i64>,
) -> ServiceResponse<Vec<GroupMember>> {
    let members = groups::members(&ctx.state, ctx.viewer, group_id).await?;
    Ok(Json(members))
}

pub async fn add_member(
    ctx: RequestContext,
    Path(group_id): Path<i64>,
    Json(args): Json<AddMemberArgs>,
) -> ServiceResponse<GroupMember> {
    let member = groups::add_member(&ctx.state, ctx.viewer, group_id, args.user_id).await?;
    Ok(Json(member))
}

pub async fn set_role(
    ctx: RequestContext,
    Path((group_id, user_id)): Path<(i64, UserId)>,
    Json(args): Json<SetRoleArgs>,
) -> ServiceResponse<()> {
    groups::set_role(&ctx.state, ctx.viewer, group_id, user_id, args.role).await?;
    Ok(Json(()))
}

pub async fn remove_member(
    ctx: RequestContext,
    Path((group_id, user_id)): Path<(i64, UserId)>,
) -> ServiceResponse<()> {
    groups::remove_member(&ctx.state, ctx.viewer, group_id, user_id).await?;
    Ok(Json(()))
}
