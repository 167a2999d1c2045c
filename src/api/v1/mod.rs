pub mod communities;
pub mod conversations;
pub mod groups;
pub mod messages;

use crate::common::state::AppState;
use axum::Router;
use axum::routing::{delete, get, post, put};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/messages/{container}",
            get(messages::history).post(messages::send),
        )
        .route("/messages/{container}/read", post(messages::mark_read))
        .route(
            "/conversations",
            get(conversations::inbox).post(conversations::open),
        )
        .route("/groups", post(groups::create))
        .route("/groups/{group_id}", delete(groups::delete))
        .route(
            "/groups/{group_id}/members",
            get(groups::members).post(groups::add_member),
        )
        .route(
            "/groups/{group_id}/members/{user_id}",
            put(groups::set_role).delete(groups::remove_member),
        )
        .route(
            "/communities/{community_id}/members",
            post(communities::join).delete(communities::leave),
        )
}
