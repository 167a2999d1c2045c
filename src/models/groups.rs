use crate::common::error::{AppError, ServiceResult};
use crate::entities::groups::{GroupChat as GroupEntity, GroupMember as MemberEntity};
use crate::models::containers::ContainerRef;
use crate::models::{MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_GROUP_NAME_LENGTH: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
        }
    }
}

impl From<String> for GroupRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => GroupRole::Admin,
            _ => GroupRole::Member,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupChat {
    pub group_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: UserId,
    pub last_message_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupChat {
    pub fn container(&self) -> ContainerRef {
        ContainerRef::group(self.group_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMember {
    pub group_id: i64,
    pub user_id: UserId,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn is_admin(&self) -> bool {
        self.role == GroupRole::Admin
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupArgs {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberArgs {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleArgs {
    pub role: GroupRole,
}

/// Outcome of a membership change checked against the admin invariant
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MembershipChange {
    Applied,
    NotMember,
    LastAdmin,
}

impl MembershipChange {
    pub fn into_result(self) -> ServiceResult<()> {
        match self {
            MembershipChange::Applied => Ok(()),
            MembershipChange::NotMember => Err(AppError::GroupsNotMember),
            MembershipChange::LastAdmin => Err(AppError::GroupsLastAdmin),
        }
    }
}

/// Decides whether `user_id` may stop being an admin,
/// given the current admin count of the group.
pub fn check_admin_demotion(current_role: Option<GroupRole>, admin_count: usize) -> MembershipChange {
    match current_role {
        None => MembershipChange::NotMember,
        Some(GroupRole::Admin) if admin_count <= 1 => MembershipChange::LastAdmin,
        Some(_) => MembershipChange::Applied,
    }
}

pub fn validate_group_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    let length = name.chars().count();
    if length == 0 || length > MAX_GROUP_NAME_LENGTH {
        return Err(AppError::GroupsInvalidName);
    }
    Ok(name.to_owned())
}

impl From<GroupEntity> for GroupChat {
    fn from(value: GroupEntity) -> Self {
        Self {
            group_id: value.id,
            name: value.name,
            description: value.description,
            creator_id: value.creator_id,
            last_message_id: value.last_message_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<MemberEntity> for GroupMember {
    fn from(value: MemberEntity) -> Self {
        Self {
            group_id: value.group_id,
            user_id: value.user_id,
            role: GroupRole::from(value.role),
            joined_at: value.joined_at,
        }
    }
}
