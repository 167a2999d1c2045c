use crate::models::UserId;
use serde::Serialize;

/// The signed-in user on whose behalf messages are loaded and marked read
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Viewer {
    pub user_id: UserId,
}

impl Viewer {
    pub const fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}
